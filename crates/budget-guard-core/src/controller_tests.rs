//! Tests for project resolution and the disable attempt.

use super::*;
use crate::billing::{BillingError, BillingResponse, MockBillingApi};
use crate::metadata::MockMetadataProvider;

fn project() -> ProjectNumber {
    ProjectNumber::parse("12345").unwrap()
}

fn ok_response() -> BillingResponse {
    BillingResponse {
        status: 200,
        status_text: "200 OK".to_string(),
        body: "{}".to_string(),
    }
}

fn controller(metadata: MockMetadataProvider, billing: MockBillingApi) -> BillingController {
    BillingController::new(Arc::new(metadata), Arc::new(billing))
}

// ============================================================================
// resolve_project_number
// ============================================================================

mod resolve_tests {
    use super::*;

    /// Verify that a configured project number skips the metadata lookup.
    #[tokio::test]
    async fn test_configured_project_skips_metadata() {
        let mut metadata = MockMetadataProvider::new();
        metadata.expect_project_number().times(0);

        let configured = project();
        let resolved = resolve_project_number(Some(&configured), &metadata)
            .await
            .unwrap();

        assert_eq!(resolved, configured);
    }

    /// Verify that the metadata lookup is used when nothing is configured.
    #[tokio::test]
    async fn test_falls_back_to_metadata() {
        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_project_number()
            .times(1)
            .returning(|| Ok(ProjectNumber::parse("777").unwrap()));

        let resolved = resolve_project_number(None, &metadata).await.unwrap();

        assert_eq!(resolved.as_str(), "777");
    }

    /// Verify that a failed lookup is reported to the caller.
    #[tokio::test]
    async fn test_lookup_failure_is_returned() {
        let mut metadata = MockMetadataProvider::new();
        metadata.expect_project_number().times(1).returning(|| {
            Err(MetadataError::Transport {
                message: "connection refused".to_string(),
            })
        });

        let result = resolve_project_number(None, &metadata).await;

        assert!(matches!(result, Err(MetadataError::Transport { .. })));
    }
}

// ============================================================================
// BillingController::disable_billing
// ============================================================================

mod disable_tests {
    use super::*;

    /// Verify the happy path sends exactly one unlink with the fetched token.
    #[tokio::test]
    async fn test_disables_billing_for_configured_project() {
        let mut metadata = MockMetadataProvider::new();
        metadata.expect_project_number().times(0);
        metadata
            .expect_access_token()
            .times(1)
            .returning(|| Ok(AccessToken::new("tok")));

        let mut billing = MockBillingApi::new();
        billing
            .expect_update_billing_info()
            .withf(|project, token, update| {
                project.as_str() == "12345"
                    && token.expose() == "tok"
                    && update.name == "projects/12345/billingInfo"
                    && update.billing_account_name.is_empty()
            })
            .times(1)
            .returning(|_, _, _| Ok(ok_response()));

        let configured = project();
        let outcome = controller(metadata, billing)
            .disable_billing(Some(&configured))
            .await;

        assert_eq!(
            outcome,
            DisableOutcome::Disabled {
                project_number: project()
            }
        );
        assert!(outcome.to_string().contains("12345"));
    }

    /// Verify the project number is looked up when none is configured.
    #[tokio::test]
    async fn test_disables_billing_for_discovered_project() {
        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_project_number()
            .times(1)
            .returning(|| Ok(ProjectNumber::parse("98765").unwrap()));
        metadata
            .expect_access_token()
            .times(1)
            .returning(|| Ok(AccessToken::new("tok")));

        let mut billing = MockBillingApi::new();
        billing
            .expect_update_billing_info()
            .withf(|project, _, _| project.as_str() == "98765")
            .times(1)
            .returning(|_, _, _| Ok(ok_response()));

        let outcome = controller(metadata, billing).disable_billing(None).await;

        assert!(outcome.is_disabled());
    }

    /// Verify an unresolvable project stops before any token or billing call.
    #[tokio::test]
    async fn test_unresolved_project_makes_no_calls() {
        let mut metadata = MockMetadataProvider::new();
        metadata.expect_project_number().times(1).returning(|| {
            Err(MetadataError::InvalidResponse {
                message: "project number is empty".to_string(),
            })
        });
        metadata.expect_access_token().times(0);

        let mut billing = MockBillingApi::new();
        billing.expect_update_billing_info().times(0);

        let outcome = controller(metadata, billing).disable_billing(None).await;

        assert!(matches!(outcome, DisableOutcome::ProjectUnresolved { .. }));
        assert!(!outcome.billing_call_attempted());
        assert!(outcome.to_string().starts_with("FAILURE: Could not determine Project Number"));
    }

    /// Verify a token transport failure ends the attempt without a billing call.
    #[tokio::test]
    async fn test_token_transport_failure_makes_no_billing_call() {
        let mut metadata = MockMetadataProvider::new();
        metadata.expect_access_token().times(1).returning(|| {
            Err(MetadataError::Transport {
                message: "connection refused".to_string(),
            })
        });

        let mut billing = MockBillingApi::new();
        billing.expect_update_billing_info().times(0);

        let configured = project();
        let outcome = controller(metadata, billing)
            .disable_billing(Some(&configured))
            .await;

        assert!(
            matches!(outcome, DisableOutcome::TokenUnavailable { .. }),
            "expected TokenUnavailable, got: {:?}",
            outcome
        );
        assert!(!outcome.billing_call_attempted());
        assert!(outcome.to_string().starts_with("FAILURE: Token Error for project 12345"));
    }

    /// Verify a token error status also degrades to an empty token.
    #[tokio::test]
    async fn test_token_error_status_degrades_to_empty_token() {
        let mut metadata = MockMetadataProvider::new();
        metadata.expect_access_token().times(1).returning(|| {
            Err(MetadataError::UnexpectedStatus {
                status: 500,
                body: "internal".to_string(),
            })
        });

        let mut billing = MockBillingApi::new();
        billing
            .expect_update_billing_info()
            .withf(|_, token, _| token.is_empty())
            .times(1)
            .returning(|_, _, _| {
                Err(BillingError::Transport {
                    message: "connection refused".to_string(),
                })
            });

        let configured = project();
        let outcome = controller(metadata, billing)
            .disable_billing(Some(&configured))
            .await;

        assert!(matches!(outcome, DisableOutcome::RequestFailed { .. }));
        assert!(outcome.billing_call_attempted());
    }

    /// Verify an unparseable token answer degrades to an empty bearer token.
    #[tokio::test]
    async fn test_unparseable_token_degrades_to_empty_token() {
        let mut metadata = MockMetadataProvider::new();
        metadata.expect_access_token().times(1).returning(|| {
            Err(MetadataError::InvalidResponse {
                message: "expected value".to_string(),
            })
        });

        let mut billing = MockBillingApi::new();
        billing
            .expect_update_billing_info()
            .withf(|_, token, _| token.is_empty())
            .times(1)
            .returning(|_, _, _| {
                Ok(BillingResponse {
                    status: 401,
                    status_text: "401 Unauthorized".to_string(),
                    body: "unauthenticated".to_string(),
                })
            });

        let configured = project();
        let outcome = controller(metadata, billing)
            .disable_billing(Some(&configured))
            .await;

        assert!(matches!(outcome, DisableOutcome::Rejected { status: 401, .. }));
        assert!(outcome.billing_call_attempted());
    }

    /// Verify a rejection carries the status and body for diagnosis.
    #[tokio::test]
    async fn test_rejection_reports_status_and_body() {
        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_access_token()
            .times(1)
            .returning(|| Ok(AccessToken::new("tok")));

        let mut billing = MockBillingApi::new();
        billing.expect_update_billing_info().times(1).returning(|_, _, _| {
            Ok(BillingResponse {
                status: 403,
                status_text: "403 Forbidden".to_string(),
                body: r#"{"error":"forbidden"}"#.to_string(),
            })
        });

        let configured = project();
        let outcome = controller(metadata, billing)
            .disable_billing(Some(&configured))
            .await;

        let message = outcome.to_string();
        assert!(message.contains("403"), "message: {message}");
        assert!(message.contains(r#"{"error":"forbidden"}"#), "message: {message}");
    }

    /// Verify a billing transport failure is reported without retrying.
    #[tokio::test]
    async fn test_billing_transport_failure_is_not_retried() {
        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_access_token()
            .times(1)
            .returning(|| Ok(AccessToken::new("tok")));

        let mut billing = MockBillingApi::new();
        billing.expect_update_billing_info().times(1).returning(|_, _, _| {
            Err(BillingError::Transport {
                message: "connection reset".to_string(),
            })
        });

        let configured = project();
        let outcome = controller(metadata, billing)
            .disable_billing(Some(&configured))
            .await;

        assert!(matches!(outcome, DisableOutcome::RequestFailed { .. }));
    }
}
