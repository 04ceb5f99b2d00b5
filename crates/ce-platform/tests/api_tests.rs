//! Platform Integration Tests
//!
//! Exercises the repositories, the registration workflow, and the auth
//! services against an in-memory store.

use std::sync::Arc;

use chrono::{Duration, Utc};

use ce_platform::domain::{Event, RegistrationStatus, Role, User};
use ce_platform::error::ApiError;
use ce_platform::repository::{
    memory_pool, EventFilter, EventRepository, RegistrationFilter, RegistrationRepository,
    UserRepository,
};
use ce_platform::service::{PasswordService, TokenConfig, TokenService};

struct Fixture {
    users: Arc<UserRepository>,
    events: Arc<EventRepository>,
    registrations: Arc<RegistrationRepository>,
}

async fn fixture() -> Fixture {
    let pool = memory_pool().await.unwrap();
    let users = Arc::new(UserRepository::new(pool.clone()));
    let events = Arc::new(EventRepository::new(pool.clone()));
    let registrations = Arc::new(RegistrationRepository::new(pool));
    users.init_schema().await.unwrap();
    events.init_schema().await.unwrap();
    registrations.init_schema().await.unwrap();
    Fixture {
        users,
        events,
        registrations,
    }
}

async fn seed_user(fx: &Fixture, username: &str, role: Role) -> User {
    let user = User::new(username, format!("{}@campus.edu", username), "hash", role);
    fx.users.insert(&user).await.unwrap();
    user
}

async fn seed_event(fx: &Fixture, creator: &User, title: &str, capacity: i64) -> Event {
    let event = Event::new(title, Utc::now() + Duration::days(7), capacity, &creator.id);
    fx.events.insert(&event).await.unwrap();
    event
}

fn default_filter() -> RegistrationFilter {
    RegistrationFilter {
        limit: 20,
        ..RegistrationFilter::default()
    }
}

mod registration_workflow {
    use super::*;

    #[tokio::test]
    async fn test_capacity_gate_blocks_at_approval_not_registration() {
        let fx = fixture().await;
        let organizer = seed_user(&fx, "organizer", Role::Organizer).await;
        let alice = seed_user(&fx, "alice", Role::Student).await;
        let bob = seed_user(&fx, "bob", Role::Student).await;
        let event = seed_event(&fx, &organizer, "Tiny Workshop", 1).await;

        let reg_a = fx.registrations.register(&event, &alice.id).await.unwrap();
        assert_eq!(reg_a.status, RegistrationStatus::Pending);

        fx.registrations
            .set_status(&reg_a.id, RegistrationStatus::Approved)
            .await
            .unwrap();
        assert_eq!(fx.events.approved_count(&event.id).await.unwrap(), 1);

        let summary = fx.events.find_summary(&event.id).await.unwrap().unwrap();
        assert!(summary.is_full);

        // A full event still accepts new pending registrations; capacity
        // only binds at approval time.
        let reg_b = fx.registrations.register(&event, &bob.id).await.unwrap();
        assert_eq!(reg_b.status, RegistrationStatus::Pending);

        // Approving B must be refused by the approval-time gate: the live
        // approved count has already reached capacity.
        let approved = fx.events.approved_count(&event.id).await.unwrap();
        assert!(approved >= event.capacity);
        assert_eq!(approved, 1);

        let row = fx
            .registrations
            .find_by_id(&reg_b.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, RegistrationStatus::Pending);
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts_and_leaves_row_unchanged() {
        let fx = fixture().await;
        let organizer = seed_user(&fx, "organizer", Role::Organizer).await;
        let alice = seed_user(&fx, "alice", Role::Student).await;
        let event = seed_event(&fx, &organizer, "Career Fair", 50).await;

        let original = fx.registrations.register(&event, &alice.id).await.unwrap();
        fx.registrations
            .set_status(&original.id, RegistrationStatus::Approved)
            .await
            .unwrap();

        let err = fx.registrations.register(&event, &alice.id).await.unwrap_err();
        match err {
            ApiError::Conflict { message } => assert!(message.contains("approved")),
            other => panic!("expected conflict, got {:?}", other),
        }

        let row = fx
            .registrations
            .find_by_id(&original.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, RegistrationStatus::Approved);
    }

    #[tokio::test]
    async fn test_cancel_only_deletes_own_row() {
        let fx = fixture().await;
        let organizer = seed_user(&fx, "organizer", Role::Organizer).await;
        let alice = seed_user(&fx, "alice", Role::Student).await;
        let mallory = seed_user(&fx, "mallory", Role::Student).await;
        let event = seed_event(&fx, &organizer, "Movie Night", 50).await;

        let reg = fx.registrations.register(&event, &alice.id).await.unwrap();

        assert!(!fx
            .registrations
            .delete_owned(&reg.id, &mallory.id)
            .await
            .unwrap());
        assert!(fx
            .registrations
            .find_by_id(&reg.id)
            .await
            .unwrap()
            .is_some());

        assert!(fx
            .registrations
            .delete_owned(&reg.id, &alice.id)
            .await
            .unwrap());
        assert!(fx
            .registrations
            .find_by_id(&reg.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_status_reversible_until_deleted() {
        let fx = fixture().await;
        let organizer = seed_user(&fx, "organizer", Role::Organizer).await;
        let alice = seed_user(&fx, "alice", Role::Student).await;
        let event = seed_event(&fx, &organizer, "Hackathon", 100).await;

        let reg = fx.registrations.register(&event, &alice.id).await.unwrap();

        for status in [
            RegistrationStatus::Approved,
            RegistrationStatus::Rejected,
            RegistrationStatus::Approved,
        ] {
            fx.registrations.set_status(&reg.id, status).await.unwrap();
            let row = fx
                .registrations
                .find_by_id(&reg.id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(row.status, status);
        }
    }
}

mod bulk_operations {
    use super::*;

    #[tokio::test]
    async fn test_bulk_updates_every_row() {
        let fx = fixture().await;
        let organizer = seed_user(&fx, "organizer", Role::Organizer).await;
        let event = seed_event(&fx, &organizer, "Orientation", 200).await;

        let mut ids = Vec::new();
        for i in 0..5 {
            let student = seed_user(&fx, &format!("student{}", i), Role::Student).await;
            let reg = fx.registrations.register(&event, &student.id).await.unwrap();
            ids.push(reg.id);
        }

        let updated = fx
            .registrations
            .bulk_set_status(&ids, RegistrationStatus::Approved)
            .await
            .unwrap();

        assert_eq!(updated.len(), 5);
        assert!(updated
            .iter()
            .all(|r| r.status == RegistrationStatus::Approved));
        assert_eq!(fx.events.approved_count(&event.id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_bulk_forbidden_for_foreign_rows_leaves_batch_untouched() {
        use axum::extract::{Json, State};
        use ce_common::NullNotifier;
        use ce_platform::api::registrations::{self, BulkStatusRequest, RegistrationsState};
        use ce_platform::api::Authenticated;

        let fx = fixture().await;
        let mallory = seed_user(&fx, "mallory", Role::Organizer).await;
        let other = seed_user(&fx, "other_org", Role::Organizer).await;
        let alice = seed_user(&fx, "alice", Role::Student).await;
        let own_event = seed_event(&fx, &mallory, "Own Mixer", 50).await;
        let foreign_event = seed_event(&fx, &other, "Foreign Gala", 50).await;

        let own_reg = fx.registrations.register(&own_event, &alice.id).await.unwrap();
        let foreign_reg = fx
            .registrations
            .register(&foreign_event, &alice.id)
            .await
            .unwrap();

        let state = RegistrationsState {
            registration_repo: fx.registrations.clone(),
            event_repo: fx.events.clone(),
            notifier: Arc::new(NullNotifier),
        };

        // One foreign id poisons the whole batch for a non-admin.
        let err = registrations::bulk_set_status(
            State(state),
            Authenticated(mallory),
            Json(BulkStatusRequest {
                ids: vec![own_reg.id.clone(), foreign_reg.id.clone()],
                status: "approved".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden { .. }));

        for id in [&own_reg.id, &foreign_reg.id] {
            let row = fx.registrations.find_by_id(id).await.unwrap().unwrap();
            assert_eq!(row.status, RegistrationStatus::Pending);
        }
    }

    #[tokio::test]
    async fn test_creators_for_omits_unknown_ids() {
        let fx = fixture().await;
        let organizer = seed_user(&fx, "organizer", Role::Organizer).await;
        let alice = seed_user(&fx, "alice", Role::Student).await;
        let event = seed_event(&fx, &organizer, "Seminar", 30).await;
        let reg = fx.registrations.register(&event, &alice.id).await.unwrap();

        let ids = vec![reg.id.clone(), "missing-id".to_string()];
        let pairs = fx.registrations.creators_for(&ids).await.unwrap();

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0], (reg.id, organizer.id));
    }

    #[tokio::test]
    async fn test_creators_for_spans_multiple_organizers() {
        let fx = fixture().await;
        let org_a = seed_user(&fx, "org_a", Role::Organizer).await;
        let org_b = seed_user(&fx, "org_b", Role::Organizer).await;
        let alice = seed_user(&fx, "alice", Role::Student).await;
        let event_a = seed_event(&fx, &org_a, "Event A", 30).await;
        let event_b = seed_event(&fx, &org_b, "Event B", 30).await;

        let reg_a = fx.registrations.register(&event_a, &alice.id).await.unwrap();
        let reg_b = fx.registrations.register(&event_b, &alice.id).await.unwrap();

        let pairs = fx
            .registrations
            .creators_for(&[reg_a.id.clone(), reg_b.id.clone()])
            .await
            .unwrap();

        assert_eq!(pairs.len(), 2);
        assert!(pairs.contains(&(reg_a.id, org_a.id)));
        assert!(pairs.contains(&(reg_b.id, org_b.id)));
    }
}

mod cascades {
    use super::*;

    #[tokio::test]
    async fn test_event_delete_cascades_to_registrations() {
        let fx = fixture().await;
        let organizer = seed_user(&fx, "organizer", Role::Organizer).await;
        let alice = seed_user(&fx, "alice", Role::Student).await;
        let event = seed_event(&fx, &organizer, "Doomed Event", 50).await;
        let reg = fx.registrations.register(&event, &alice.id).await.unwrap();

        assert!(fx.events.delete(&event.id).await.unwrap());

        assert!(fx.events.find_by_id(&event.id).await.unwrap().is_none());
        assert!(fx
            .registrations
            .find_by_id(&reg.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_user_delete_cascades_to_events_and_registrations() {
        let fx = fixture().await;
        let organizer = seed_user(&fx, "organizer", Role::Organizer).await;
        let alice = seed_user(&fx, "alice", Role::Student).await;
        let event = seed_event(&fx, &organizer, "Orphaned Event", 50).await;
        let reg = fx.registrations.register(&event, &alice.id).await.unwrap();

        assert!(fx.users.delete(&organizer.id).await.unwrap());

        assert!(fx.events.find_by_id(&event.id).await.unwrap().is_none());
        assert!(fx
            .registrations
            .find_by_id(&reg.id)
            .await
            .unwrap()
            .is_none());
    }
}

mod event_listings {
    use super::*;

    #[tokio::test]
    async fn test_new_event_has_zero_attendees() {
        let fx = fixture().await;
        let organizer = seed_user(&fx, "organizer", Role::Organizer).await;
        let event = seed_event(&fx, &organizer, "Fresh Event", 50).await;

        let summary = fx.events.find_summary(&event.id).await.unwrap().unwrap();
        assert_eq!(summary.attendee_count, 0);
        assert!(!summary.is_full);
        assert_eq!(summary.creator_username, "organizer");
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let fx = fixture().await;
        let organizer = seed_user(&fx, "organizer", Role::Organizer).await;
        seed_event(&fx, &organizer, "Robotics Showcase", 50).await;
        seed_event(&fx, &organizer, "Poetry Night", 50).await;

        let filter = EventFilter {
            search: Some("ROBOTICS".to_string()),
            limit: 20,
            ..EventFilter::default()
        };
        let (items, total) = fx.events.list(&filter).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].title, "Robotics Showcase");
    }

    #[tokio::test]
    async fn test_upcoming_filter_hides_past_events() {
        let fx = fixture().await;
        let organizer = seed_user(&fx, "organizer", Role::Organizer).await;
        seed_event(&fx, &organizer, "Future Event", 50).await;

        let past = Event::new(
            "Past Event",
            Utc::now() - Duration::days(3),
            50,
            &organizer.id,
        );
        fx.events.insert(&past).await.unwrap();

        let filter = EventFilter {
            upcoming_only: true,
            limit: 20,
            ..EventFilter::default()
        };
        let (items, total) = fx.events.list(&filter).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].title, "Future Event");

        let all = fx
            .events
            .list(&EventFilter {
                limit: 20,
                ..EventFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(all.1, 2);
    }

    #[tokio::test]
    async fn test_pagination_totals_and_ordering() {
        let fx = fixture().await;
        let organizer = seed_user(&fx, "organizer", Role::Organizer).await;
        for i in 0..5 {
            let event = Event::new(
                format!("Event {}", i),
                Utc::now() + Duration::days(i + 1),
                50,
                &organizer.id,
            );
            fx.events.insert(&event).await.unwrap();
        }

        let page1 = fx
            .events
            .list(&EventFilter {
                limit: 2,
                offset: 0,
                ..EventFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(page1.1, 5);
        assert_eq!(page1.0.len(), 2);
        assert_eq!(page1.0[0].title, "Event 0");

        let page3 = fx
            .events
            .list(&EventFilter {
                limit: 2,
                offset: 4,
                ..EventFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(page3.0.len(), 1);
        assert_eq!(page3.0[0].title, "Event 4");
    }

    #[tokio::test]
    async fn test_managed_listing_scopes_to_creator() {
        let fx = fixture().await;
        let org_a = seed_user(&fx, "org_a", Role::Organizer).await;
        let org_b = seed_user(&fx, "org_b", Role::Organizer).await;
        let alice = seed_user(&fx, "alice", Role::Student).await;
        let event_a = seed_event(&fx, &org_a, "Event A", 30).await;
        let event_b = seed_event(&fx, &org_b, "Event B", 30).await;
        fx.registrations.register(&event_a, &alice.id).await.unwrap();
        fx.registrations.register(&event_b, &alice.id).await.unwrap();

        let (mine, total) = fx
            .registrations
            .list_managed(Some(&org_a.id), &default_filter())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(mine[0].event_title, "Event A");

        // Admin scope sees everything.
        let (all, all_total) = fx
            .registrations
            .list_managed(None, &default_filter())
            .await
            .unwrap();
        assert_eq!(all_total, 2);
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_user_listing_filters_by_status() {
        let fx = fixture().await;
        let organizer = seed_user(&fx, "organizer", Role::Organizer).await;
        let alice = seed_user(&fx, "alice", Role::Student).await;
        let event_a = seed_event(&fx, &organizer, "Event A", 30).await;
        let event_b = seed_event(&fx, &organizer, "Event B", 30).await;

        let reg_a = fx.registrations.register(&event_a, &alice.id).await.unwrap();
        fx.registrations.register(&event_b, &alice.id).await.unwrap();
        fx.registrations
            .set_status(&reg_a.id, RegistrationStatus::Approved)
            .await
            .unwrap();

        let approved_only = RegistrationFilter {
            status: Some(RegistrationStatus::Approved),
            ..default_filter()
        };
        let (items, total) = fx
            .registrations
            .list_for_user(&alice.id, &approved_only)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].event_title, "Event A");
        assert_eq!(items[0].username, "alice");
    }
}

mod accounts {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_username_or_email_conflicts() {
        let fx = fixture().await;
        seed_user(&fx, "alice", Role::Student).await;

        let same_username = User::new("alice", "other@campus.edu", "hash", Role::Student);
        assert!(matches!(
            fx.users.insert(&same_username).await.unwrap_err(),
            ApiError::Conflict { .. }
        ));

        let same_email = User::new("alice2", "alice@campus.edu", "hash", Role::Student);
        assert!(matches!(
            fx.users.insert(&same_email).await.unwrap_err(),
            ApiError::Conflict { .. }
        ));
    }

    #[tokio::test]
    async fn test_profile_update_respects_uniqueness() {
        let fx = fixture().await;
        seed_user(&fx, "alice", Role::Student).await;
        let bob = seed_user(&fx, "bob", Role::Student).await;

        let err = fx
            .users
            .update_profile(&bob.id, "alice", "bob@campus.edu")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict { .. }));

        fx.users
            .update_profile(&bob.id, "bobby", "bobby@campus.edu")
            .await
            .unwrap();
        let updated = fx.users.find_by_id(&bob.id).await.unwrap().unwrap();
        assert_eq!(updated.username, "bobby");
        assert_eq!(updated.email, "bobby@campus.edu");
    }

    #[tokio::test]
    async fn test_login_flow_with_hashed_password() {
        let fx = fixture().await;
        let passwords = PasswordService::new();
        let tokens = TokenService::new(TokenConfig::default());

        let hash = passwords.hash("hunter22").unwrap();
        let user = User::new("carol", "carol@campus.edu", &hash, Role::Student);
        fx.users.insert(&user).await.unwrap();

        let found = fx
            .users
            .find_by_email("carol@campus.edu")
            .await
            .unwrap()
            .unwrap();
        assert!(passwords.verify("hunter22", &found.password_hash).unwrap());
        assert!(!passwords.verify("wrong", &found.password_hash).unwrap());

        let token = tokens.issue(&found).unwrap();
        let claims = tokens.decode(&token).unwrap();
        assert_eq!(claims.sub, found.id);

        // Deleting the account invalidates the session even while the token
        // itself still verifies.
        fx.users.delete(&found.id).await.unwrap();
        assert!(fx.users.find_by_id(&claims.sub).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        use axum::extract::{Json, State};
        use ce_platform::api::auth::{login, LoginRequest};
        use ce_platform::api::AuthApiState;

        let fx = fixture().await;
        let passwords = Arc::new(PasswordService::new());
        let tokens = Arc::new(TokenService::new(TokenConfig::default()));

        let hash = passwords.hash("hunter22").unwrap();
        let user = User::new("erin", "erin@campus.edu", &hash, Role::Student);
        fx.users.insert(&user).await.unwrap();

        let state = AuthApiState {
            user_repo: fx.users.clone(),
            token_service: tokens,
            password_service: passwords,
        };

        let unknown_email = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "ghost@campus.edu".to_string(),
                password: "hunter22".to_string(),
            }),
        )
        .await
        .unwrap_err();

        let wrong_password = login(
            State(state),
            Json(LoginRequest {
                email: "erin@campus.edu".to_string(),
                password: "not-hunter22".to_string(),
            }),
        )
        .await
        .unwrap_err();

        // Unknown email and wrong password collapse into one error.
        assert!(matches!(unknown_email, ApiError::InvalidCredentials));
        assert!(matches!(wrong_password, ApiError::InvalidCredentials));
        assert_eq!(unknown_email.to_string(), wrong_password.to_string());
    }

    #[tokio::test]
    async fn test_password_rotation() {
        let fx = fixture().await;
        let passwords = PasswordService::new();

        let hash = passwords.hash("old-password").unwrap();
        let user = User::new("dave", "dave@campus.edu", &hash, Role::Student);
        fx.users.insert(&user).await.unwrap();

        let new_hash = passwords.hash("new-password").unwrap();
        fx.users.update_password(&user.id, &new_hash).await.unwrap();

        let updated = fx.users.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(passwords.verify("new-password", &updated.password_hash).unwrap());
        assert!(!passwords.verify("old-password", &updated.password_hash).unwrap());
    }
}
