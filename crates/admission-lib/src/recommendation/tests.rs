//! Tests for the recommendation pipeline
//!
//! These cover:
//! - Override amendment and its fallback chain
//! - Per-container request selection in pod order
//! - Proportional limits under policy and limit-range constraints
//! - Provider error propagation

use super::*;
use crate::annotations::{GATE_CPU_ANNOTATION, GATE_MEMORY_ANNOTATION};
use crate::limits::{LimitRangeCalculator, NoopLimitRangeCalculator, StaticLimitRangeCalculator};
use crate::models::{
    ContainerControlledValues, ContainerResourcePolicy, PodResourcePolicy, PodUpdatePolicy,
    RecommendedContainerResources, ResourceList, VerticalPodAutoscalerCondition,
    VerticalPodAutoscalerSpec, VerticalPodAutoscalerStatus, RESOURCE_CPU, RESOURCE_MEMORY,
};
use crate::processor::{
    CappingProcessor, PassThroughProcessor, ProcessedRecommendation, ProcessingFailure,
    RecommendationProcessor,
};
use anyhow::anyhow;
use k8s_openapi::api::core::v1::{Container, LimitRangeItem, PodSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

fn list(pairs: &[(&str, &str)]) -> ResourceList {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Quantity(v.to_string())))
        .collect()
}

fn container(name: &str, requests: &[(&str, &str)], limits: &[(&str, &str)]) -> Container {
    Container {
        name: name.to_string(),
        resources: Some(ResourceRequirements {
            requests: (!requests.is_empty()).then(|| list(requests)),
            limits: (!limits.is_empty()).then(|| list(limits)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn pod(containers: Vec<Container>) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some("p".to_string()),
            namespace: Some("ns".to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers,
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn recommendation(name: &str, target: &[(&str, &str)]) -> RecommendedPodResources {
    RecommendedPodResources {
        container_recommendations: vec![RecommendedContainerResources {
            container_name: name.to_string(),
            target: list(target),
            lower_bound: list(target),
            ..Default::default()
        }],
    }
}

fn vpa(rec: RecommendedPodResources, annotations: &[(&str, &str)]) -> VerticalPodAutoscaler {
    VerticalPodAutoscaler {
        metadata: ObjectMeta {
            name: Some("vpa".to_string()),
            annotations: Some(
                annotations
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        },
        spec: VerticalPodAutoscalerSpec::default(),
        status: Some(VerticalPodAutoscalerStatus {
            recommendation: Some(rec),
            conditions: vec![VerticalPodAutoscalerCondition {
                type_: "RecommendationProvided".to_string(),
                status: "True".to_string(),
                ..Default::default()
            }],
        }),
    }
}

fn provider() -> RecommendationProvider {
    RecommendationProvider::new(
        Arc::new(NoopLimitRangeCalculator),
        Arc::new(PassThroughProcessor),
    )
}

fn web_pod() -> Pod {
    pod(vec![container(
        "web",
        &[(RESOURCE_CPU, "100m")],
        &[(RESOURCE_CPU, "200m")],
    )])
}

mod amend_tests {
    use super::*;

    fn overrides(pairs: &[(&str, &str)]) -> AnnotationOverrides {
        AnnotationOverrides::resolve(
            &pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_override_replaces_target() {
        let mut rec = recommendation("web", &[(RESOURCE_CPU, "250m")]);
        amend_recommendation(
            &mut rec,
            &web_pod(),
            &overrides(&[("web.recommendations.com/cpu", "300m")]),
        )
        .unwrap();

        assert_eq!(rec.container_recommendations[0].target, list(&[(RESOURCE_CPU, "300m")]));
    }

    #[test]
    fn test_fallback_to_original_request_then_removal() {
        let pod = pod(vec![container("web", &[(RESOURCE_MEMORY, "128Mi")], &[])]);
        let mut rec = recommendation("web", &[(RESOURCE_CPU, "250m"), (RESOURCE_MEMORY, "300Mi")]);

        // override for another container only
        amend_recommendation(
            &mut rec,
            &pod,
            &overrides(&[("db.recommendations.com/cpu", "1")]),
        )
        .unwrap();

        let target = &rec.container_recommendations[0].target;
        assert_eq!(target, &list(&[(RESOURCE_MEMORY, "128Mi")]));
        assert!(!target.contains_key(RESOURCE_CPU));
    }

    #[test]
    fn test_only_target_is_amended() {
        let mut rec = recommendation("web", &[(RESOURCE_CPU, "250m")]);
        amend_recommendation(
            &mut rec,
            &web_pod(),
            &overrides(&[("web.recommendations.com/cpu", "2")]),
        )
        .unwrap();

        assert_eq!(
            rec.container_recommendations[0].lower_bound,
            list(&[(RESOURCE_CPU, "250m")])
        );
    }

    #[test]
    fn test_malformed_override_fails() {
        let mut rec = recommendation("web", &[(RESOURCE_CPU, "250m")]);
        let err = amend_recommendation(
            &mut rec,
            &web_pod(),
            &overrides(&[("web.recommendations.com/cpu", "fast")]),
        )
        .unwrap_err();

        assert!(matches!(err, Error::InvalidOverride { .. }));
    }

    #[test]
    fn test_override_without_target_entry_is_ignored() {
        let mut rec = recommendation("web", &[(RESOURCE_CPU, "250m")]);
        amend_recommendation(
            &mut rec,
            &web_pod(),
            &overrides(&[("web.recommendations.com/memory", "1Gi")]),
        )
        .unwrap();

        assert_eq!(rec.container_recommendations[0].target, list(&[(RESOURCE_CPU, "100m")]));
    }
}

mod resolve_tests {
    use super::*;

    fn resolve(
        pod: &Pod,
        policy: Option<&PodResourcePolicy>,
        rec: &RecommendedPodResources,
        limit_range: Option<&LimitRangeItem>,
        include_unmatched: bool,
    ) -> (Vec<ContainerResources>, ContainerToAnnotationsMap) {
        let mut annotations = ContainerToAnnotationsMap::new();
        let resources =
            get_containers_resources(pod, policy, rec, limit_range, include_unmatched, &mut annotations)
                .unwrap();
        (resources, annotations)
    }

    #[test]
    fn test_output_aligned_with_containers() {
        let pod = pod(vec![
            container("a", &[(RESOURCE_CPU, "1")], &[]),
            container("b", &[(RESOURCE_CPU, "2")], &[]),
            container("c", &[(RESOURCE_CPU, "3")], &[]),
        ]);
        let mut rec = recommendation("c", &[(RESOURCE_CPU, "30")]);
        rec.container_recommendations
            .extend(recommendation("a", &[(RESOURCE_CPU, "10")]).container_recommendations);

        let (resources, _) = resolve(&pod, None, &rec, None, false);

        assert_eq!(resources.len(), 3);
        assert_eq!(resources[0].requests, Some(list(&[(RESOURCE_CPU, "10")])));
        assert!(resources[1].is_empty());
        assert_eq!(resources[2].requests, Some(list(&[(RESOURCE_CPU, "30")])));
    }

    #[test]
    fn test_unmatched_container_uses_pod_request_when_requested() {
        let pod = pod(vec![
            container("a", &[(RESOURCE_CPU, "1")], &[]),
            container("b", &[(RESOURCE_CPU, "2")], &[(RESOURCE_CPU, "4")]),
        ]);
        let rec = recommendation("a", &[(RESOURCE_CPU, "10")]);

        let (resources, _) = resolve(&pod, None, &rec, None, true);

        assert_eq!(resources[1].requests, Some(list(&[(RESOURCE_CPU, "2")])));
        assert_eq!(resources[1].limits, Some(list(&[(RESOURCE_CPU, "4")])));
    }

    #[test]
    fn test_requests_only_never_sets_limits() {
        let policy = PodResourcePolicy {
            container_policies: vec![ContainerResourcePolicy {
                container_name: "web".to_string(),
                controlled_values: Some(ContainerControlledValues::RequestsOnly),
                ..Default::default()
            }],
        };
        let rec = recommendation("web", &[(RESOURCE_CPU, "250m")]);

        let (resources, annotations) = resolve(&web_pod(), Some(&policy), &rec, None, false);

        assert_eq!(resources[0].requests, Some(list(&[(RESOURCE_CPU, "250m")])));
        assert_eq!(resources[0].limits, None);
        assert!(annotations.is_empty());
    }

    #[test]
    fn test_limit_range_default_and_cap() {
        let pod = pod(vec![container("web", &[(RESOURCE_MEMORY, "512Mi")], &[])]);
        let rec = recommendation("web", &[(RESOURCE_MEMORY, "1Gi")]);
        let limit_range = LimitRangeItem {
            type_: "Container".to_string(),
            default: Some(list(&[(RESOURCE_MEMORY, "1Gi")])),
            max: Some(list(&[(RESOURCE_MEMORY, "1Gi")])),
            ..Default::default()
        };

        let (resources, annotations) = resolve(&pod, None, &rec, Some(&limit_range), false);

        assert_eq!(resources[0].limits, Some(list(&[(RESOURCE_MEMORY, "1Gi")])));
        assert_eq!(
            annotations["web"],
            vec!["memory limit capped to namespace maximum for web"]
        );
    }

    #[test]
    fn test_annotations_appended_after_existing_entries() {
        let pod = pod(vec![container(
            "web",
            &[(RESOURCE_MEMORY, "512Mi")],
            &[(RESOURCE_MEMORY, "1Gi")],
        )]);
        let rec = recommendation("web", &[(RESOURCE_MEMORY, "1Gi")]);
        let limit_range = LimitRangeItem {
            type_: "Container".to_string(),
            max: Some(list(&[(RESOURCE_MEMORY, "1Gi")])),
            ..Default::default()
        };
        let mut annotations = ContainerToAnnotationsMap::new();
        annotations.insert("web".to_string(), vec!["memory capped to maxAllowed".to_string()]);

        get_containers_resources(&pod, None, &rec, Some(&limit_range), false, &mut annotations)
            .unwrap();

        assert_eq!(
            annotations["web"],
            vec![
                "memory capped to maxAllowed",
                "memory limit capped to namespace maximum for web"
            ]
        );
    }

    #[test]
    fn test_pod_without_spec_yields_no_resources() {
        let (resources, _) = resolve(&Pod::default(), None, &RecommendedPodResources::default(), None, false);
        assert!(resources.is_empty());
    }
}

mod provider_tests {
    use super::*;

    struct FailingLimitRanges;

    impl LimitRangeCalculator for FailingLimitRanges {
        fn container_limit_range_item(&self, _namespace: &str) -> anyhow::Result<Option<LimitRangeItem>> {
            Err(anyhow!("lister unavailable"))
        }
    }

    struct FailingProcessor;

    impl RecommendationProcessor for FailingProcessor {
        fn apply(
            &self,
            _recommendation: RecommendedPodResources,
            _policy: Option<&PodResourcePolicy>,
            _conditions: &[VerticalPodAutoscalerCondition],
            _pod: &Pod,
        ) -> std::result::Result<ProcessedRecommendation, ProcessingFailure> {
            Err(ProcessingFailure {
                reason: anyhow!("recommendation is stale"),
                annotations: [("web".to_string(), vec!["cpu capped to maxAllowed".to_string()])].into(),
            })
        }
    }

    fn resolve(provider: &RecommendationProvider, pod: &Pod, vpa: &VerticalPodAutoscaler) -> PodResources {
        provider
            .get_containers_resources_for_pod(Some(pod), Some(vpa))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_missing_inputs_are_not_errors() {
        let provider = provider();
        let vpa = vpa(RecommendedPodResources::default(), &[]);
        assert!(provider.get_containers_resources_for_pod(None, Some(&vpa)).unwrap().is_none());
        assert!(provider.get_containers_resources_for_pod(Some(&web_pod()), None).unwrap().is_none());
    }

    #[test]
    fn test_ratio_preserved_for_recommendation() {
        let vpa = vpa(recommendation("web", &[(RESOURCE_CPU, "250m")]), &[]);

        let got = resolve(&provider(), &web_pod(), &vpa);

        assert_eq!(
            got.containers,
            vec![ContainerResources {
                requests: Some(list(&[(RESOURCE_CPU, "250m")])),
                limits: Some(list(&[(RESOURCE_CPU, "500m")])),
            }]
        );
        assert!(got.annotations.is_empty());
    }

    #[test]
    fn test_override_annotation_wins() {
        let vpa = vpa(
            recommendation("web", &[(RESOURCE_CPU, "250m")]),
            &[("web.recommendations.com/cpu", "300m")],
        );

        let got = resolve(&provider(), &web_pod(), &vpa);

        assert_eq!(got.containers[0].requests, Some(list(&[(RESOURCE_CPU, "300m")])));
        assert_eq!(got.containers[0].limits, Some(list(&[(RESOURCE_CPU, "600m")])));
    }

    #[test]
    fn test_status_recommendation_is_not_mutated() {
        let vpa = vpa(
            recommendation("web", &[(RESOURCE_CPU, "250m")]),
            &[("web.recommendations.com/cpu", "300m")],
        );
        let before = vpa.clone();

        resolve(&provider(), &web_pod(), &vpa);

        assert_eq!(vpa, before);
    }

    #[test]
    fn test_auto_gate_skips_amendment() {
        let vpa = vpa(
            recommendation("web", &[(RESOURCE_CPU, "250m")]),
            &[
                (GATE_CPU_ANNOTATION, "auto"),
                (GATE_MEMORY_ANNOTATION, "auto"),
                ("web.recommendations.com/cpu", "300m"),
            ],
        );

        let got = resolve(&provider(), &web_pod(), &vpa);

        assert_eq!(got.containers[0].requests, Some(list(&[(RESOURCE_CPU, "250m")])));
    }

    #[test]
    fn test_update_mode_off_ignores_resource_policy() {
        let mut vpa = vpa(recommendation("web", &[(RESOURCE_CPU, "250m")]), &[]);
        vpa.spec.resource_policy = Some(PodResourcePolicy {
            container_policies: vec![ContainerResourcePolicy {
                container_name: "*".to_string(),
                controlled_values: Some(ContainerControlledValues::RequestsOnly),
                ..Default::default()
            }],
        });

        let got = resolve(&provider(), &web_pod(), &vpa);
        assert_eq!(got.containers[0].limits, None);

        vpa.spec.update_policy = Some(PodUpdatePolicy {
            update_mode: Some(UpdateMode::Off),
            ..Default::default()
        });
        let got = resolve(&provider(), &web_pod(), &vpa);
        assert_eq!(got.containers[0].limits, Some(list(&[(RESOURCE_CPU, "500m")])));
    }

    #[test]
    fn test_vpa_without_recommendation_leaves_pod_untouched() {
        let mut vpa = vpa(RecommendedPodResources::default(), &[]);
        vpa.status = None;

        let got = resolve(&provider(), &web_pod(), &vpa);

        assert_eq!(got.containers, vec![ContainerResources::default()]);
    }

    #[test]
    fn test_namespace_limit_range_applied() {
        let mut limit_ranges = StaticLimitRangeCalculator::new();
        limit_ranges.insert(
            "ns",
            LimitRangeItem {
                type_: "Container".to_string(),
                max: Some(list(&[(RESOURCE_CPU, "400m")])),
                ..Default::default()
            },
        );
        let provider = RecommendationProvider::new(Arc::new(limit_ranges), Arc::new(PassThroughProcessor));
        let vpa = vpa(recommendation("web", &[(RESOURCE_CPU, "250m")]), &[]);

        let got = resolve(&provider, &web_pod(), &vpa);

        assert_eq!(got.containers[0].limits, Some(list(&[(RESOURCE_CPU, "400m")])));
        assert_eq!(
            got.annotations["web"],
            vec!["cpu limit capped to namespace maximum for web"]
        );
    }

    #[test]
    fn test_limit_notes_exclude_policy_capping() {
        let mut limit_ranges = StaticLimitRangeCalculator::new();
        limit_ranges.insert(
            "ns",
            LimitRangeItem {
                type_: "Container".to_string(),
                max: Some(list(&[(RESOURCE_CPU, "400m")])),
                ..Default::default()
            },
        );
        let provider = RecommendationProvider::new(Arc::new(limit_ranges), Arc::new(CappingProcessor));
        let mut vpa = vpa(recommendation("web", &[(RESOURCE_CPU, "250m")]), &[]);
        vpa.spec.resource_policy = Some(PodResourcePolicy {
            container_policies: vec![ContainerResourcePolicy {
                container_name: "web".to_string(),
                max_allowed: Some(list(&[(RESOURCE_CPU, "150m")])),
                ..Default::default()
            }],
        });

        let got = resolve(&provider, &web_pod(), &vpa);
        assert_eq!(got.containers[0].limits, Some(list(&[(RESOURCE_CPU, "300m")])));
        assert_eq!(got.annotations["web"], vec!["cpu capped to maxAllowed"]);
        assert_eq!(got.limit_notes, 0);

        vpa.spec.resource_policy = Some(PodResourcePolicy {
            container_policies: vec![ContainerResourcePolicy {
                container_name: "web".to_string(),
                max_allowed: Some(list(&[(RESOURCE_CPU, "300m")])),
                ..Default::default()
            }],
        });
        let got = resolve(&provider, &web_pod(), &vpa);
        assert_eq!(got.containers[0].limits, Some(list(&[(RESOURCE_CPU, "400m")])));
        assert_eq!(
            got.annotations["web"],
            vec!["cpu limit capped to namespace maximum for web"]
        );
        assert_eq!(got.limit_notes, 1);
    }

    #[test]
    fn test_include_unmatched_provider() {
        let pod = pod(vec![
            container("web", &[(RESOURCE_CPU, "100m")], &[]),
            container("sidecar", &[(RESOURCE_CPU, "50m")], &[]),
        ]);
        let vpa = vpa(recommendation("web", &[(RESOURCE_CPU, "250m")]), &[]);

        let got = resolve(&provider().with_include_unmatched(true), &pod, &vpa);

        assert_eq!(got.containers[1].requests, Some(list(&[(RESOURCE_CPU, "50m")])));
    }

    #[test]
    fn test_limit_range_failure_is_fatal() {
        let provider = RecommendationProvider::new(Arc::new(FailingLimitRanges), Arc::new(PassThroughProcessor));
        let vpa = vpa(recommendation("web", &[(RESOURCE_CPU, "250m")]), &[]);

        let err = provider
            .get_containers_resources_for_pod(Some(&web_pod()), Some(&vpa))
            .unwrap_err();

        assert_eq!(err.to_string(), "error getting containerLimitRange: lister unavailable");
        assert!(err.annotations().is_none());
    }

    #[test]
    fn test_processing_failure_returns_annotations() {
        let provider = RecommendationProvider::new(Arc::new(NoopLimitRangeCalculator), Arc::new(FailingProcessor));
        let vpa = vpa(recommendation("web", &[(RESOURCE_CPU, "250m")]), &[]);

        let err = provider
            .get_containers_resources_for_pod(Some(&web_pod()), Some(&vpa))
            .unwrap_err();

        assert_eq!(err.kind(), "processing");
        assert_eq!(
            err.annotations().unwrap()["web"],
            vec!["cpu capped to maxAllowed"]
        );
    }

    #[test]
    fn test_malformed_override_fails_call() {
        let vpa = vpa(
            recommendation("web", &[(RESOURCE_CPU, "250m")]),
            &[("web.recommendations.com/cpu", "a lot")],
        );

        let err = provider()
            .get_containers_resources_for_pod(Some(&web_pod()), Some(&vpa))
            .unwrap_err();

        assert_eq!(err.kind(), "invalid_override");
    }
}
