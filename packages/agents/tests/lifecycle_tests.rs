// ABOUTME: Integration tests for the agent lifecycle state machine
// ABOUTME: Create, pause, resume, update and delete against a fake fleet manager

mod common;

use agentbay_agents::{AgentStatus, CreateAgentRequest, ManagerError, UpdateAgentRequest};
use agentbay_fleet::FleetError;
use agentbay_integrations::{NewIntegrationToken, Provider, SqliteTokenStore, TokenStore};
use agentbay_ledger::{SubscriptionStorage, TransactionType};
use common::{create_request, invariant_violations, setup, FleetMode};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_create_seeds_credits_and_provisions() {
    let ctx = setup(FleetMode::Accept).await;

    let outcome = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap();

    assert_eq!(outcome.agent.status, AgentStatus::Active);
    assert!(outcome.agent.compute_id.is_some());
    assert!(outcome.advisory.is_none());
    assert_eq!(outcome.balance_cents, 1000);

    let balance = ctx.ledger.get_balance(&ctx.account_id).await.unwrap();
    assert_eq!(balance.balance_cents, 1000);

    let history = ctx.ledger.list_transactions(&ctx.account_id, 20).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].amount_cents, 1000);
    assert_eq!(history[0].transaction_type, TransactionType::Credit);

    let subscription = SubscriptionStorage::new(ctx.pool.clone())
        .get(&ctx.account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.status, "active");

    assert_eq!(
        ctx.fleet.balance_syncs.lock().unwrap().clone(),
        vec![(ctx.account_id.clone(), 1000)]
    );
    assert_eq!(invariant_violations(&ctx.pool).await, 0);
}

#[tokio::test]
async fn test_create_survives_fleet_outage() {
    let ctx = setup(FleetMode::Down).await;

    let outcome = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap();

    assert_eq!(outcome.agent.status, AgentStatus::Pending);
    assert!(outcome.agent.compute_id.is_none());
    assert_eq!(
        outcome.advisory.as_deref(),
        Some("Agent created, provisioning in progress")
    );

    let balance = ctx.ledger.get_balance(&ctx.account_id).await.unwrap();
    assert_eq!(balance.balance_cents, 1000);
    assert_eq!(invariant_violations(&ctx.pool).await, 0);
}

#[tokio::test]
async fn test_create_with_rejected_provision_reports_success() {
    let ctx = setup(FleetMode::Reject).await;

    let outcome = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap();

    assert_eq!(outcome.agent.status, AgentStatus::Failed);
    assert!(outcome.advisory.unwrap().contains("Resume the agent to retry"));
}

#[tokio::test]
async fn test_create_validation_has_no_side_effects() {
    let ctx = setup(FleetMode::Accept).await;

    for request in [
        CreateAgentRequest {
            template_id: None,
            ..create_request("Bot")
        },
        CreateAgentRequest {
            display_name: Some("  ".to_string()),
            ..create_request("Bot")
        },
        CreateAgentRequest {
            behavior_spec: None,
            ..create_request("Bot")
        },
        CreateAgentRequest {
            config: Some(serde_json::json!("not a map")),
            ..create_request("Bot")
        },
    ] {
        let err = ctx.manager.create(&ctx.account_id, request).await.unwrap_err();
        assert!(matches!(err, ManagerError::Validation(_)), "got {:?}", err);
    }

    assert!(ctx.manager.list(&ctx.account_id).await.unwrap().is_empty());
    assert_eq!(
        ctx.ledger.get_balance(&ctx.account_id).await.unwrap().balance_cents,
        0
    );
    assert_eq!(ctx.fleet.provision_count(), 0);
}

#[tokio::test]
async fn test_provision_carries_connected_tokens() {
    let ctx = setup(FleetMode::Accept).await;
    SqliteTokenStore::new(ctx.pool.clone())
        .upsert(
            &ctx.account_id,
            NewIntegrationToken {
                provider: Provider::Gmail,
                access_token: "ya29.access".to_string(),
                refresh_token: Some("1//refresh".to_string()),
                agent_id: None,
                identity: Some("test@example.com".to_string()),
            },
        )
        .await
        .unwrap();

    ctx.manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap();

    let provisions = ctx.fleet.provisions.lock().unwrap();
    let request = &provisions[0];
    assert_eq!(request.account_id, ctx.account_id);
    assert_eq!(request.display_name, "Bot");
    assert_eq!(request.integrations["gmail"]["enabled"], true);
    assert_eq!(
        request.integrations["tokens"]["gmail"]["access_token"],
        "ya29.access"
    );
}

#[tokio::test]
async fn test_pause_is_idempotent() {
    let ctx = setup(FleetMode::Accept).await;
    let agent = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap()
        .agent;

    let first = ctx.manager.pause(&ctx.account_id, &agent.id).await.unwrap();
    let second = ctx.manager.pause(&ctx.account_id, &agent.id).await.unwrap();

    assert_eq!(first.status, AgentStatus::Paused);
    assert_eq!(second.status, AgentStatus::Paused);
    assert!(second.compute_id.is_none());
    assert_eq!(ctx.fleet.deprovision_count(), 1);
    assert_eq!(invariant_violations(&ctx.pool).await, 0);
}

#[tokio::test]
async fn test_pause_tolerates_fleet_outage() {
    let ctx = setup(FleetMode::Accept).await;
    let agent = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap()
        .agent;

    ctx.fleet.set_mode(FleetMode::Down);
    let paused = ctx.manager.pause(&ctx.account_id, &agent.id).await.unwrap();

    assert_eq!(paused.status, AgentStatus::Paused);
    assert!(paused.compute_id.is_none());
}

#[tokio::test]
async fn test_pause_of_pending_agent_tears_down_by_id() {
    let ctx = setup(FleetMode::Down).await;
    let agent = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap()
        .agent;
    assert_eq!(agent.status, AgentStatus::Pending);
    assert!(agent.compute_id.is_none());

    // The timed-out provision may still have started compute
    ctx.fleet.set_mode(FleetMode::Accept);
    let paused = ctx.manager.pause(&ctx.account_id, &agent.id).await.unwrap();

    assert_eq!(paused.status, AgentStatus::Paused);
    assert_eq!(
        ctx.fleet.deprovisions.lock().unwrap().clone(),
        vec![agent.id.clone()]
    );

    // Already paused: nothing left to release
    ctx.manager.pause(&ctx.account_id, &agent.id).await.unwrap();
    ctx.manager.delete(&ctx.account_id, &agent.id).await.unwrap();
    assert_eq!(ctx.fleet.deprovision_count(), 1);
}

#[tokio::test]
async fn test_pause_of_pending_agent_survives_fleet_outage() {
    let ctx = setup(FleetMode::Down).await;
    let agent = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap()
        .agent;

    let paused = ctx.manager.pause(&ctx.account_id, &agent.id).await.unwrap();
    assert_eq!(paused.status, AgentStatus::Paused);
    assert_eq!(invariant_violations(&ctx.pool).await, 0);
}

#[tokio::test]
async fn test_resume_without_credits_is_rejected() {
    let ctx = setup(FleetMode::Accept).await;
    let agent = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap()
        .agent;
    ctx.manager.pause(&ctx.account_id, &agent.id).await.unwrap();
    ctx.ledger
        .debit(&ctx.account_id, 1000, "AI usage: claude-sonnet")
        .await
        .unwrap();

    let err = ctx
        .manager
        .resume(&ctx.account_id, &agent.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ManagerError::InsufficientCredits { balance_cents: 0 }
    ));

    let unchanged = ctx.manager.get(&ctx.account_id, &agent.id).await.unwrap();
    assert_eq!(unchanged.status, AgentStatus::Paused);
    assert_eq!(ctx.fleet.provision_count(), 1);
}

#[tokio::test]
async fn test_pause_then_resume_reaches_active() {
    let ctx = setup(FleetMode::Accept).await;
    let agent = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap()
        .agent;
    ctx.ledger.debit(&ctx.account_id, 500, "AI usage").await.unwrap();

    ctx.manager.pause(&ctx.account_id, &agent.id).await.unwrap();
    let resumed = ctx.manager.resume(&ctx.account_id, &agent.id).await.unwrap();

    assert_eq!(resumed.status, AgentStatus::Active);
    assert!(resumed.compute_id.is_some());
    assert_ne!(resumed.compute_id, agent.compute_id);
    assert_eq!(invariant_violations(&ctx.pool).await, 0);
}

#[tokio::test]
async fn test_resume_failure_marks_failed_and_surfaces() {
    let ctx = setup(FleetMode::Accept).await;
    let agent = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap()
        .agent;
    ctx.ledger.debit(&ctx.account_id, 500, "AI usage").await.unwrap();
    ctx.manager.pause(&ctx.account_id, &agent.id).await.unwrap();

    ctx.fleet.set_mode(FleetMode::Down);
    let err = ctx
        .manager
        .resume(&ctx.account_id, &agent.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ManagerError::Provisioning(FleetError::Network(_))
    ));

    let failed = ctx.manager.get(&ctx.account_id, &agent.id).await.unwrap();
    assert_eq!(failed.status, AgentStatus::Failed);
    assert!(failed.compute_id.is_none());

    // A later resume with the fleet back retries from failed
    ctx.fleet.set_mode(FleetMode::Accept);
    let resumed = ctx.manager.resume(&ctx.account_id, &agent.id).await.unwrap();
    assert_eq!(resumed.status, AgentStatus::Active);
}

#[tokio::test]
async fn test_resume_of_running_agent_does_not_reprovision() {
    let ctx = setup(FleetMode::Accept).await;
    let agent = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap()
        .agent;

    let again = ctx.manager.resume(&ctx.account_id, &agent.id).await.unwrap();
    assert_eq!(again.compute_id, agent.compute_id);
    assert_eq!(ctx.fleet.provision_count(), 1);
}

#[tokio::test]
async fn test_update_patches_whitelisted_fields() {
    let ctx = setup(FleetMode::Accept).await;
    let agent = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap()
        .agent;

    let updated = ctx
        .manager
        .update(
            &ctx.account_id,
            &agent.id,
            UpdateAgentRequest {
                display_name: Some("Inbox Bot".to_string()),
                config: Some(serde_json::json!({"timezone": "UTC"})),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.display_name, "Inbox Bot");
    assert_eq!(updated.config["timezone"], "UTC");
    assert_eq!(updated.behavior_spec, agent.behavior_spec);
    assert_eq!(updated.status, AgentStatus::Active);
    assert_eq!(updated.compute_id, agent.compute_id);
    assert_eq!(ctx.fleet.provision_count(), 1);
}

#[tokio::test]
async fn test_update_cannot_bypass_state_machine() {
    let ctx = setup(FleetMode::Accept).await;
    let agent = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap()
        .agent;

    for status in [AgentStatus::Active, AgentStatus::Provisioning, AgentStatus::Paused] {
        let err = ctx
            .manager
            .update(
                &ctx.account_id,
                &agent.id,
                UpdateAgentRequest {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::Validation(_)));
    }

    let err = ctx
        .manager
        .update(&ctx.account_id, &agent.id, UpdateAgentRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ManagerError::Validation(_)));
}

#[tokio::test]
async fn test_update_status_of_stopped_agent() {
    let ctx = setup(FleetMode::Reject).await;
    let agent = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap()
        .agent;
    assert_eq!(agent.status, AgentStatus::Failed);

    let updated = ctx
        .manager
        .update(
            &ctx.account_id,
            &agent.id,
            UpdateAgentRequest {
                status: Some(AgentStatus::Paused),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, AgentStatus::Paused);
}

#[tokio::test]
async fn test_delete_releases_compute_then_removes_row() {
    let ctx = setup(FleetMode::Accept).await;
    let agent = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap()
        .agent;

    ctx.manager.delete(&ctx.account_id, &agent.id).await.unwrap();

    assert_eq!(
        ctx.fleet.deprovisions.lock().unwrap().clone(),
        vec![agent.id.clone()]
    );
    assert!(matches!(
        ctx.manager.get(&ctx.account_id, &agent.id).await,
        Err(ManagerError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_proceeds_when_fleet_is_down() {
    let ctx = setup(FleetMode::Accept).await;
    let agent = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap()
        .agent;

    ctx.fleet.set_mode(FleetMode::Down);
    ctx.manager.delete(&ctx.account_id, &agent.id).await.unwrap();

    assert!(ctx.manager.list(&ctx.account_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_agents_are_scoped_to_their_account() {
    let ctx = setup(FleetMode::Accept).await;
    let agent = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap()
        .agent;

    let stranger = "another-account";
    assert!(matches!(
        ctx.manager.get(stranger, &agent.id).await,
        Err(ManagerError::NotFound(_))
    ));
    assert!(matches!(
        ctx.manager.pause(stranger, &agent.id).await,
        Err(ManagerError::NotFound(_))
    ));
    assert!(matches!(
        ctx.manager.delete(stranger, &agent.id).await,
        Err(ManagerError::NotFound(_))
    ));
    assert!(ctx.manager.list(stranger).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_is_newest_first_and_pause_all_active() {
    let ctx = setup(FleetMode::Accept).await;
    let first = ctx
        .manager
        .create(&ctx.account_id, create_request("First"))
        .await
        .unwrap()
        .agent;
    let second = ctx
        .manager
        .create(&ctx.account_id, create_request("Second"))
        .await
        .unwrap()
        .agent;

    let names: Vec<String> = ctx
        .manager
        .list(&ctx.account_id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.display_name)
        .collect();
    assert_eq!(names, vec!["Second".to_string(), "First".to_string()]);

    let mut paused = ctx.manager.pause_all_active(&ctx.account_id).await.unwrap();
    paused.sort();
    let mut expected = vec![first.id, second.id];
    expected.sort();
    assert_eq!(paused, expected);
    assert_eq!(invariant_violations(&ctx.pool).await, 0);
}

#[tokio::test]
async fn test_delete_of_pending_agent_tears_down_by_id() {
    let ctx = setup(FleetMode::Down).await;
    let agent = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap()
        .agent;
    assert_eq!(agent.status, AgentStatus::Pending);

    ctx.fleet.set_mode(FleetMode::Accept);
    ctx.manager.delete(&ctx.account_id, &agent.id).await.unwrap();

    assert_eq!(
        ctx.fleet.deprovisions.lock().unwrap().clone(),
        vec![agent.id.clone()]
    );
}

#[tokio::test]
async fn test_delete_of_failed_agent_tears_down_by_id() {
    let ctx = setup(FleetMode::Reject).await;
    let agent = ctx
        .manager
        .create(&ctx.account_id, create_request("Bot"))
        .await
        .unwrap()
        .agent;
    assert_eq!(agent.status, AgentStatus::Failed);

    ctx.fleet.set_mode(FleetMode::Accept);
    ctx.manager.delete(&ctx.account_id, &agent.id).await.unwrap();

    assert_eq!(ctx.fleet.deprovision_count(), 1);
}
