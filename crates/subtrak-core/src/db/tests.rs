//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{reconcile_import, ImportTarget};
    use chrono::{Duration, NaiveDate};
    use rusqlite::params;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (Database, i64) {
        let db = Database::in_memory().unwrap();
        let user_id = db.upsert_user("test@example.com", Some("Test")).unwrap();
        (db, user_id)
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(db.list_users().unwrap().is_empty());
    }

    #[test]
    fn test_schema_tables_exist() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('users', 'categories', 'payment_methods', 'linked_accounts',
                  'subscriptions', 'price_history', 'cancellation_logs',
                  'subscription_members', 'sharing_platforms', 'shared_subscriptions')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 10);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let db = Database::in_memory().unwrap();
        let path = db.path().to_string();
        drop(db);
        let reopened = Database::new_unencrypted(&path).unwrap();
        assert!(reopened.list_users().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_user() {
        let db = Database::in_memory().unwrap();
        let id = db.upsert_user("a@example.com", None).unwrap();
        let id2 = db.upsert_user("a@example.com", Some("Alex")).unwrap();
        assert_eq!(id, id2);

        let user = db.get_user(id).unwrap().unwrap();
        assert_eq!(user.name.as_deref(), Some("Alex"));
        assert!(db.get_user_by_email("missing@example.com").unwrap().is_none());
    }

    #[test]
    fn test_subscription_crud() {
        let (db, user_id) = setup();

        let mut new = NewSubscription::new(user_id, "Netflix", 13500.0, date(2024, 7, 15));
        new.billing_day = Some(15);
        let id = db.create_subscription(&new).unwrap();

        let sub = db.get_subscription(id).unwrap().unwrap();
        assert_eq!(sub.name, "Netflix");
        assert_eq!(sub.amount, 13500.0);
        assert_eq!(sub.currency, "KRW");
        assert_eq!(sub.billing_cycle, BillingCycle::Monthly);
        assert_eq!(sub.billing_day, Some(15));
        assert!(sub.is_active);
        assert!(sub.auto_renew);
        assert!(sub.updated_at.is_none());

        assert!(db.get_subscription(9999).unwrap().is_none());
    }

    #[test]
    fn test_list_subscriptions_filters_and_order() {
        let (db, user_id) = setup();
        let category = db.create_category(user_id, "Video", None, None).unwrap();

        let mut late = NewSubscription::new(user_id, "Late", 1000.0, date(2024, 8, 1));
        late.category_id = Some(category);
        db.create_subscription(&late).unwrap();
        let early = db
            .create_subscription(&NewSubscription::new(user_id, "Early", 1000.0, date(2024, 7, 1)))
            .unwrap();
        db.deactivate_subscription(early).unwrap();

        let all = db
            .list_subscriptions(user_id, &SubscriptionFilter::default())
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Early");

        let active = db
            .list_subscriptions(user_id, &SubscriptionFilter::active())
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Late");

        let in_category = db
            .list_subscriptions(
                user_id,
                &SubscriptionFilter {
                    category_id: Some(category),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(in_category.len(), 1);

        let other_user = db.upsert_user("other@example.com", None).unwrap();
        assert!(db
            .list_subscriptions(other_user, &SubscriptionFilter::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_update_amount_appends_price_history() {
        let (db, user_id) = setup();
        let id = db
            .create_subscription(&NewSubscription::new(user_id, "Netflix", 13500.0, date(2024, 7, 15)))
            .unwrap();

        let updated = db
            .update_subscription(
                id,
                &SubscriptionUpdate {
                    amount: Some(17000.0),
                    ..Default::default()
                },
                Some("premium plan"),
            )
            .unwrap();
        assert_eq!(updated.amount, 17000.0);
        assert!(updated.updated_at.is_some());

        let history = db.list_price_history(id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].old_amount, 13500.0);
        assert_eq!(history[0].new_amount, 17000.0);
        assert_eq!(history[0].old_currency, "KRW");
        assert_eq!(history[0].notes.as_deref(), Some("premium plan"));

        // No price change, no history row
        db.update_subscription(
            id,
            &SubscriptionUpdate {
                notes: Some(Some("family".to_string())),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        assert_eq!(db.list_price_history(id).unwrap().len(), 1);
        let sub = db.get_subscription(id).unwrap().unwrap();
        assert_eq!(sub.notes.as_deref(), Some("family"));
        assert_eq!(sub.amount, 17000.0);
    }

    #[test]
    fn test_update_currency_records_both_currencies() {
        let (db, user_id) = setup();
        let id = db
            .create_subscription(&NewSubscription::new(user_id, "GitHub", 4.0, date(2024, 7, 1)))
            .unwrap();

        db.update_subscription(
            id,
            &SubscriptionUpdate {
                amount: Some(5600.0),
                currency: Some("USD".to_string()),
                ..Default::default()
            },
            None,
        )
        .unwrap();

        let history = db.list_price_history(id).unwrap();
        assert_eq!(history[0].old_currency, "KRW");
        assert_eq!(history[0].new_currency, "USD");
    }

    #[test]
    fn test_update_clears_nullable_fields() {
        let (db, user_id) = setup();
        let category = db.create_category(user_id, "Music", None, None).unwrap();
        let mut new = NewSubscription::new(user_id, "Spotify", 10900.0, date(2024, 7, 1));
        new.category_id = Some(category);
        let id = db.create_subscription(&new).unwrap();

        db.update_subscription(
            id,
            &SubscriptionUpdate {
                category_id: Some(None),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        assert!(db.get_subscription(id).unwrap().unwrap().category_id.is_none());
    }

    #[test]
    fn test_update_missing_subscription() {
        let (db, _) = setup();
        let result = db.update_subscription(42, &SubscriptionUpdate::default(), None);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_price_history_is_append_only() {
        let (db, user_id) = setup();
        let id = db
            .create_subscription(&NewSubscription::new(user_id, "Netflix", 13500.0, date(2024, 7, 15)))
            .unwrap();
        db.add_price_history(id, 13500.0, 17000.0, "KRW", None).unwrap();

        let conn = db.conn().unwrap();
        assert!(conn
            .execute("UPDATE price_history SET new_amount = 1 WHERE subscription_id = ?", params![id])
            .is_err());
        assert!(conn
            .execute("DELETE FROM price_history WHERE subscription_id = ?", params![id])
            .is_err());
        drop(conn);

        assert_eq!(db.list_price_history(id).unwrap()[0].new_amount, 17000.0);
    }

    #[test]
    fn test_cancel_writes_one_log() {
        let (db, user_id) = setup();
        let mut new = NewSubscription::new(user_id, "Domain", 24000.0, date(2024, 9, 1));
        new.billing_cycle = BillingCycle::Yearly;
        let id = db.create_subscription(&new).unwrap();

        let log = db.cancel_subscription(id, Some("not used")).unwrap();
        assert_eq!(log.savings_per_month, 2000.0);
        assert_eq!(log.subscription_name.as_deref(), Some("Domain"));

        let sub = db.get_subscription(id).unwrap().unwrap();
        assert!(!sub.is_active);
        assert!(!sub.auto_renew);

        // Terminal state
        assert!(matches!(
            db.cancel_subscription(id, None),
            Err(Error::InvalidData(_))
        ));

        let logs = db.list_cancellation_logs(user_id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].reason.as_deref(), Some("not used"));
    }

    #[test]
    fn test_find_subscription_by_id_or_name() {
        let (db, user_id) = setup();
        let id = db
            .create_subscription(&NewSubscription::new(user_id, "YouTube Premium", 14900.0, date(2024, 7, 1)))
            .unwrap();

        assert_eq!(db.find_subscription(user_id, &id.to_string()).unwrap().unwrap().id, id);
        assert_eq!(db.find_subscription(user_id, "YouTube Premium").unwrap().unwrap().id, id);
        assert_eq!(db.find_subscription(user_id, "youtube premium").unwrap().unwrap().id, id);
        assert!(db.find_subscription(user_id, "Netflix").unwrap().is_none());

        // Ids belonging to another user are not resolved
        let other = db.upsert_user("other@example.com", None).unwrap();
        assert!(db.find_subscription(other, &id.to_string()).unwrap().is_none());
    }

    #[test]
    fn test_find_active_by_name_ignores_cancelled() {
        let (db, user_id) = setup();
        let id = db
            .create_subscription(&NewSubscription::new(user_id, "Netflix", 13500.0, date(2024, 7, 15)))
            .unwrap();
        assert!(db.find_active_subscription_by_name(user_id, "Netflix").unwrap().is_some());

        db.cancel_subscription(id, None).unwrap();
        assert!(db.find_active_subscription_by_name(user_id, "Netflix").unwrap().is_none());
    }

    #[test]
    fn test_reconcile_into_database() {
        let (db, user_id) = setup();
        let today = date(2024, 6, 20);
        let card = db.find_or_create_payment_method(user_id, "Shinhan Card").unwrap();

        let candidates = vec![
            ImportCandidate {
                name: "Netflix".to_string(),
                amount: 13500,
                billing_cycle: BillingCycle::Monthly,
                billing_day: 15,
            },
            ImportCandidate {
                name: "Netflix".to_string(),
                amount: 13500,
                billing_cycle: BillingCycle::Monthly,
                billing_day: 15,
            },
        ];

        let report = reconcile_import(&db, user_id, &candidates, Some(card), today).unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.details[1].contains("already registered"));

        let sub = ImportTarget::find_active_subscription_by_name(&db, user_id, "Netflix")
            .unwrap()
            .unwrap();
        assert_eq!(sub.next_payment_date, date(2024, 7, 15));
        assert_eq!(sub.start_date, today);
        assert_eq!(sub.payment_method_id, Some(card));

        // A cancelled subscription no longer blocks a re-import
        db.cancel_subscription(sub.id, None).unwrap();
        let again = reconcile_import(&db, user_id, &candidates[..1], None, today).unwrap();
        assert_eq!(again.imported, 1);
    }

    fn import_candidate(name: &str, day: u32) -> ImportCandidate {
        ImportCandidate {
            name: name.to_string(),
            amount: 10000,
            billing_cycle: BillingCycle::Monthly,
            billing_day: day,
        }
    }

    #[test]
    fn test_import_candidates_commits_batch() {
        let (db, user_id) = setup();
        let candidates = vec![
            import_candidate("Melon", 3),
            import_candidate("Watcha", 9),
            import_candidate("Melon", 3),
        ];

        let report = db
            .import_candidates(user_id, &candidates, None, date(2024, 6, 20))
            .unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(
            db.list_subscriptions(user_id, &SubscriptionFilter::active())
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_import_candidates_rolls_back_on_failure() {
        let (db, user_id) = setup();
        // Make the second insert of the batch fail
        db.conn()
            .unwrap()
            .execute_batch(
                r#"
                CREATE TRIGGER reject_watcha BEFORE INSERT ON subscriptions
                WHEN NEW.name = 'Watcha'
                BEGIN
                    SELECT RAISE(ABORT, 'rejected');
                END;
                "#,
            )
            .unwrap();

        let candidates = vec![
            import_candidate("Melon", 3),
            import_candidate("Watcha", 9),
            import_candidate("Tving", 12),
        ];
        let result = db.import_candidates(user_id, &candidates, None, date(2024, 6, 20));
        assert!(result.is_err());

        // Nothing from the failed batch is kept
        let all = db
            .list_subscriptions(user_id, &SubscriptionFilter::default())
            .unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn test_categories() {
        let (db, user_id) = setup();
        let id = db.create_category(user_id, "Video", None, Some("tv")).unwrap();

        let category = db.get_category(id).unwrap().unwrap();
        assert_eq!(category.color, DEFAULT_CATEGORY_COLOR);
        assert_eq!(category.icon.as_deref(), Some("tv"));

        db.update_category(id, Some("Streaming"), Some("#ff0000"), None).unwrap();
        let category = db.get_category(id).unwrap().unwrap();
        assert_eq!(category.name, "Streaming");
        assert_eq!(category.color, "#ff0000");
        assert_eq!(category.icon.as_deref(), Some("tv"));

        assert!(matches!(
            db.update_category(999, Some("x"), None, None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_deleting_category_uncategorizes_subscriptions() {
        let (db, user_id) = setup();
        let category = db.create_category(user_id, "Video", None, None).unwrap();
        let mut new = NewSubscription::new(user_id, "Netflix", 13500.0, date(2024, 7, 15));
        new.category_id = Some(category);
        let id = db.create_subscription(&new).unwrap();

        db.delete_category(category).unwrap();
        assert!(db.get_subscription(id).unwrap().unwrap().category_id.is_none());
        assert!(db.list_categories(user_id).unwrap().is_empty());
    }

    #[test]
    fn test_find_or_create_payment_method() {
        let (db, user_id) = setup();
        let id = db.find_or_create_payment_method(user_id, "Shinhan Card").unwrap();
        let id2 = db.find_or_create_payment_method(user_id, "Shinhan Card").unwrap();
        assert_eq!(id, id2);

        let method = db.get_payment_method(id).unwrap().unwrap();
        assert_eq!(method.card_type, CardType::Credit);
        assert!(method.is_active);

        let other = db.upsert_user("other@example.com", None).unwrap();
        assert_ne!(db.find_or_create_payment_method(other, "Shinhan Card").unwrap(), id);
    }

    #[test]
    fn test_payment_method_update_and_retire() {
        let (db, user_id) = setup();
        let id = db
            .create_payment_method(
                user_id,
                &NewPaymentMethod {
                    name: "KB".to_string(),
                    card_last_four: Some("1111".to_string()),
                    card_type: CardType::Debit,
                    expiry_date: Some(date(2026, 1, 31)),
                    ..Default::default()
                },
            )
            .unwrap();

        db.update_payment_method(
            id,
            &NewPaymentMethod {
                name: "KB Nori".to_string(),
                card_last_four: Some("2222".to_string()),
                card_type: CardType::Credit,
                expiry_date: Some(date(2029, 1, 31)),
                ..Default::default()
            },
        )
        .unwrap();
        db.set_payment_method_active(id, false).unwrap();

        let methods = db.list_payment_methods(user_id).unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "KB Nori");
        assert_eq!(methods[0].card_last_four.as_deref(), Some("2222"));
        assert_eq!(methods[0].expiry_date, Some(date(2029, 1, 31)));
        assert!(!methods[0].is_active);
    }

    #[test]
    fn test_linked_accounts() {
        let (db, user_id) = setup();
        let id = db
            .create_linked_account(user_id, "Shinhan Card", "0306", "conn-123", BusinessType::Card, None)
            .unwrap();

        let account = db.get_linked_account(id).unwrap().unwrap();
        assert_eq!(account.organization_code, "0306");
        assert!(account.last_synced_at.is_none());

        let now = chrono::Utc::now();
        db.touch_linked_account_synced(id, now).unwrap();
        let account = db.get_linked_account(id).unwrap().unwrap();
        assert_eq!(
            account.last_synced_at.map(|t| t.timestamp()),
            Some(now.timestamp())
        );

        assert_eq!(db.list_linked_accounts(user_id).unwrap().len(), 1);
        db.delete_linked_account(id).unwrap();
        assert!(db.list_linked_accounts(user_id).unwrap().is_empty());
    }

    #[test]
    fn test_dashboard_shows_overdue_payments() {
        let (db, user_id) = setup();
        let netflix = NewSubscription::new(user_id, "Netflix", 13500.0, date(2024, 6, 1));
        db.create_subscription(&netflix).unwrap();
        let today = date(2024, 6, 10);

        let summary = db.dashboard_summary(user_id, today, 30).unwrap();
        assert_eq!(summary.upcoming_payments.len(), 1);
        assert_eq!(summary.upcoming_payments[0].days_until, -9);

        let upcoming = db.upcoming_payments(user_id, today, 7).unwrap();
        assert_eq!(upcoming.len(), 1);

        // Reminders only cover payments from today on
        assert!(db.upcoming_payments_due(today, 3).unwrap().is_empty());
    }

    #[test]
    fn test_maintenance_windows_saturate() {
        let (db, user_id) = setup();
        let netflix = NewSubscription::new(user_id, "Netflix", 13500.0, date(2024, 6, 15));
        db.create_subscription(&netflix).unwrap();
        let today = date(2024, 6, 10);

        assert_eq!(db.upcoming_payments_due(today, i64::MAX).unwrap().len(), 1);
        assert!(db.expiring_payment_methods(today, i64::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_dashboard_summary() {
        let (db, user_id) = setup();
        let today = date(2024, 6, 1);
        let video = db.create_category(user_id, "Video", Some("#ef4444"), None).unwrap();
        let card = db.find_or_create_payment_method(user_id, "Shinhan Card").unwrap();

        let mut netflix = NewSubscription::new(user_id, "Netflix", 13500.0, date(2024, 6, 15));
        netflix.category_id = Some(video);
        netflix.payment_method_id = Some(card);
        db.create_subscription(&netflix).unwrap();

        let mut domain = NewSubscription::new(user_id, "Domain", 18000.0, date(2024, 12, 1));
        domain.billing_cycle = BillingCycle::Yearly;
        db.create_subscription(&domain).unwrap();

        let gym = db
            .create_subscription(&NewSubscription::new(user_id, "Gym", 50000.0, date(2024, 6, 3)))
            .unwrap();
        db.cancel_subscription(gym, Some("moved")).unwrap();

        let summary = db.dashboard_summary(user_id, today, 30).unwrap();
        assert_eq!(summary.active_count, 2);
        assert_eq!(summary.total_monthly_cost, 15000.0);
        assert_eq!(summary.total_yearly_cost, 180000.0);
        assert_eq!(summary.upcoming_payments.len(), 1);
        assert_eq!(summary.upcoming_payments[0].days_until, 14);
        assert_eq!(summary.category_breakdown[0].category_name, "Video");
        assert_eq!(summary.category_breakdown[1].category_name, "Uncategorized");
        assert_eq!(summary.card_breakdown.len(), 1);
        assert_eq!(summary.card_breakdown[0].subscription_count, 1);
        assert_eq!(summary.total_savings_from_cancellations, 50000.0);

        let savings = db.savings_summary(user_id).unwrap();
        assert_eq!(savings.cancellation_count, 1);
        assert_eq!(savings.total_cumulative_savings, 600000.0);
    }

    #[test]
    fn test_card_change_checklist_sorted_by_name() {
        let (db, user_id) = setup();
        let card = db.find_or_create_payment_method(user_id, "Old Card").unwrap();
        for name in ["Spotify", "Apple", "Netflix"] {
            let mut new = NewSubscription::new(user_id, name, 1000.0, date(2024, 7, 1));
            new.payment_method_id = Some(card);
            db.create_subscription(&new).unwrap();
        }
        db.create_subscription(&NewSubscription::new(user_id, "Elsewhere", 1000.0, date(2024, 7, 1)))
            .unwrap();

        let names: Vec<String> = db
            .card_change_checklist(user_id, card)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Apple", "Netflix", "Spotify"]);
    }

    #[test]
    fn test_calendar_month() {
        let (db, user_id) = setup();
        let netflix = NewSubscription::new(user_id, "Netflix", 13500.0, date(2024, 6, 15));
        db.create_subscription(&netflix).unwrap();

        let month = db.calendar_month(user_id, 2024, 8).unwrap();
        assert_eq!(month.events.len(), 1);
        assert_eq!(month.events[0].date, date(2024, 8, 15));
        assert_eq!(month.total_amount, 13500.0);
    }

    #[test]
    fn test_advance_overdue_single_step() {
        let (db, user_id) = setup();
        let today = date(2024, 6, 10);

        let behind = db
            .create_subscription(&NewSubscription::new(user_id, "Behind", 1000.0, date(2024, 4, 5)))
            .unwrap();
        let due_today = db
            .create_subscription(&NewSubscription::new(user_id, "Today", 1000.0, today))
            .unwrap();
        let mut weekly = NewSubscription::new(user_id, "Weekly", 1000.0, date(2024, 6, 8));
        weekly.billing_cycle = BillingCycle::Weekly;
        let weekly = db.create_subscription(&weekly).unwrap();
        let cancelled = db
            .create_subscription(&NewSubscription::new(user_id, "Cancelled", 1000.0, date(2024, 1, 1)))
            .unwrap();
        db.cancel_subscription(cancelled, None).unwrap();

        let rolled = db.advance_overdue_payment_dates(today).unwrap();
        assert_eq!(rolled.len(), 2);

        // One cycle per pass, even when still behind
        assert_eq!(
            db.get_subscription(behind).unwrap().unwrap().next_payment_date,
            date(2024, 5, 5)
        );
        assert_eq!(
            db.get_subscription(weekly).unwrap().unwrap().next_payment_date,
            date(2024, 6, 15)
        );
        assert_eq!(
            db.get_subscription(due_today).unwrap().unwrap().next_payment_date,
            today
        );
        assert_eq!(
            db.get_subscription(cancelled).unwrap().unwrap().next_payment_date,
            date(2024, 1, 1)
        );

        db.advance_overdue_payment_dates(today).unwrap();
        assert_eq!(
            db.get_subscription(behind).unwrap().unwrap().next_payment_date,
            date(2024, 6, 5)
        );
    }

    #[test]
    fn test_advance_clamps_month_end() {
        let (db, user_id) = setup();
        let id = db
            .create_subscription(&NewSubscription::new(user_id, "EOM", 1000.0, date(2024, 1, 31)))
            .unwrap();
        db.advance_overdue_payment_dates(date(2024, 2, 10)).unwrap();
        assert_eq!(
            db.get_subscription(id).unwrap().unwrap().next_payment_date,
            date(2024, 2, 29)
        );
    }

    #[test]
    fn test_upcoming_and_expiring_across_users() {
        let (db, user_id) = setup();
        let other = db.upsert_user("other@example.com", None).unwrap();
        let today = date(2024, 6, 1);

        db.create_subscription(&NewSubscription::new(user_id, "Soon", 1000.0, today + Duration::days(3)))
            .unwrap();
        db.create_subscription(&NewSubscription::new(other, "Also", 1000.0, today))
            .unwrap();
        db.create_subscription(&NewSubscription::new(user_id, "Later", 1000.0, today + Duration::days(4)))
            .unwrap();

        let due = db.upcoming_payments_due(today, 3).unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].user_id, other);
        assert_eq!(due[1].payment.subscription_name, "Soon");

        db.create_payment_method(
            user_id,
            &NewPaymentMethod {
                name: "Expiring".to_string(),
                expiry_date: Some(today + Duration::days(30)),
                ..Default::default()
            },
        )
        .unwrap();
        db.create_payment_method(
            other,
            &NewPaymentMethod {
                name: "Fine".to_string(),
                expiry_date: Some(today + Duration::days(31)),
                ..Default::default()
            },
        )
        .unwrap();

        let expiring = db.expiring_payment_methods(today, 30).unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].name, "Expiring");
    }

    #[test]
    fn test_save_discovered_cards() {
        let (db, user_id) = setup();
        let id = db
            .create_linked_account(user_id, "Shinhan Card", "0306", "conn-1", BusinessType::Card, None)
            .unwrap();
        let account = db.get_linked_account(id).unwrap().unwrap();

        let cards: Vec<crate::normalize::RawTransaction> = [
            serde_json::json!({"resCardName": "Deep Dream", "resCardNo": "9410-****-****-1234"}),
            serde_json::json!({"resCardName": "Mr.Life", "resCardNo": "5107-****-****-9876"}),
            serde_json::json!({"resCardName": "No number"}),
        ]
        .iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();

        let created = db.save_discovered_cards(&account, &cards).unwrap();
        assert_eq!(created.len(), 2);

        let method = db.get_payment_method(created[0]).unwrap().unwrap();
        assert_eq!(method.name, "Deep Dream");
        assert_eq!(method.card_last_four.as_deref(), Some("1234"));
        assert_eq!(method.linked_account_id, Some(id));

        // Saving the same list again adds nothing
        assert!(db.save_discovered_cards(&account, &cards).unwrap().is_empty());
        assert_eq!(db.list_payment_methods(user_id).unwrap().len(), 2);
    }

    #[test]
    fn test_save_discovered_cards_falls_back_to_institution() {
        let (db, user_id) = setup();
        let id = db
            .create_linked_account(
                user_id,
                "KB Bank",
                "0004",
                "conn-2",
                BusinessType::Bank,
                Some("110-123-456789"),
            )
            .unwrap();
        let account = db.get_linked_account(id).unwrap().unwrap();

        let created = db.save_discovered_cards(&account, &[]).unwrap();
        assert_eq!(created.len(), 1);
        let method = db.get_payment_method(created[0]).unwrap().unwrap();
        assert_eq!(method.name, "KB Bank");
        assert_eq!(method.card_type, CardType::BankTransfer);
        assert_eq!(method.card_last_four.as_deref(), Some("6789"));
    }

    #[test]
    fn test_subscription_members() {
        let (db, user_id) = setup();
        let youtube = NewSubscription::new(user_id, "YouTube Premium", 17000.0, date(2024, 7, 1));
        let sub_id = db.create_subscription(&youtube).unwrap();

        let me = NewSubscriptionMember {
            name: "Me".to_string(),
            share_percentage: Some(50.0),
            is_owner: true,
            ..Default::default()
        };
        db.add_subscription_member(user_id, sub_id, &me).unwrap();
        let sister = NewSubscriptionMember {
            name: "Sister".to_string(),
            email: Some("sister@example.com".to_string()),
            share_amount: Some(8500.0),
            ..Default::default()
        };
        let sister_id = db.add_subscription_member(user_id, sub_id, &sister).unwrap();

        let members = db.list_subscription_members(user_id, sub_id).unwrap();
        assert_eq!(members.len(), 2);
        assert!(members[0].is_owner);
        assert_eq!(members[0].effective_share(17000.0), Some(8500.0));

        let update = SubscriptionMemberUpdate {
            share_amount: Some(None),
            share_percentage: Some(Some(30.0)),
            ..Default::default()
        };
        let updated = db
            .update_subscription_member(user_id, sub_id, sister_id, &update)
            .unwrap();
        assert_eq!(updated.share_amount, None);
        assert_eq!(updated.email.as_deref(), Some("sister@example.com"));
        assert_eq!(updated.effective_share(17000.0), Some(5100.0));

        db.remove_subscription_member(user_id, sub_id, sister_id).unwrap();
        assert_eq!(db.list_subscription_members(user_id, sub_id).unwrap().len(), 1);
        assert!(matches!(
            db.remove_subscription_member(user_id, sub_id, sister_id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_members_rejects_bad_shares_and_foreign_subscriptions() {
        let (db, user_id) = setup();
        let other_id = db.upsert_user("other@example.com", None).unwrap();
        let netflix = NewSubscription::new(user_id, "Netflix", 17000.0, date(2024, 7, 1));
        let sub_id = db.create_subscription(&netflix).unwrap();

        let too_much = NewSubscriptionMember {
            name: "Friend".to_string(),
            share_percentage: Some(120.0),
            ..Default::default()
        };
        assert!(matches!(
            db.add_subscription_member(user_id, sub_id, &too_much),
            Err(Error::InvalidData(_))
        ));

        let friend = NewSubscriptionMember {
            name: "Friend".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            db.add_subscription_member(other_id, sub_id, &friend),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            db.list_subscription_members(other_id, sub_id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_sharing_platforms_seed_and_unique() {
        let db = Database::in_memory().unwrap();

        let platforms = db.list_sharing_platforms().unwrap();
        assert_eq!(platforms.len(), DEFAULT_SHARING_PLATFORMS.len());
        // Seeding happens once
        assert_eq!(db.list_sharing_platforms().unwrap().len(), platforms.len());

        let gamsgo = NewSharingPlatform {
            name: "Gamsgo".to_string(),
            url: Some("https://gamsgo.com".to_string()),
            ..Default::default()
        };
        let id = db.create_sharing_platform(&gamsgo).unwrap();
        assert!(matches!(
            db.create_sharing_platform(&gamsgo),
            Err(Error::InvalidData(_))
        ));
        assert_eq!(db.find_or_create_sharing_platform("Gamsgo").unwrap(), id);
        assert_ne!(db.find_or_create_sharing_platform("Dosharing").unwrap(), id);
        assert_eq!(
            db.list_sharing_platforms().unwrap().len(),
            DEFAULT_SHARING_PLATFORMS.len() + 2
        );
    }

    #[test]
    fn test_shared_subscription_lifecycle() {
        let (db, user_id) = setup();
        let other_id = db.upsert_user("other@example.com", None).unwrap();
        let netflix = NewSubscription::new(user_id, "Netflix", 17000.0, date(2024, 7, 1));
        let sub_id = db.create_subscription(&netflix).unwrap();
        let platform_id = db.find_or_create_sharing_platform("Linkid").unwrap();

        let mut seat = NewSharedSubscription::new(sub_id, platform_id, 4250.0);
        seat.total_members = 4;
        seat.platform_fee = Some(490.0);
        seat.party_status = PartyStatus::Matching;
        let id = db.create_shared_subscription(user_id, &seat).unwrap();

        let shared = db.get_shared_subscription(user_id, id).unwrap().unwrap();
        assert_eq!(shared.my_role, PartyRole::Member);
        assert_eq!(shared.party_status, PartyStatus::Matching);
        assert_eq!(shared.subscription_name.as_deref(), Some("Netflix"));
        assert_eq!(shared.platform_name.as_deref(), Some("Linkid"));
        assert_eq!(shared.monthly_total(), 4740.0);
        assert!(db.get_shared_subscription(other_id, id).unwrap().is_none());

        let update = SharedSubscriptionUpdate {
            party_status: Some(PartyStatus::Active),
            platform_fee: Some(None),
            ..Default::default()
        };
        let updated = db.update_shared_subscription(user_id, id, &update).unwrap();
        assert_eq!(updated.party_status, PartyStatus::Active);
        assert_eq!(updated.monthly_total(), 4250.0);
        assert!(updated.updated_at.is_some());

        let empty_party = SharedSubscriptionUpdate {
            total_members: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            db.update_shared_subscription(user_id, id, &empty_party),
            Err(Error::InvalidData(_))
        ));

        assert_eq!(db.list_shared_subscriptions(user_id).unwrap().len(), 1);
        assert!(db.list_shared_subscriptions(other_id).unwrap().is_empty());
        assert!(matches!(
            db.delete_shared_subscription(other_id, id),
            Err(Error::NotFound(_))
        ));
        db.delete_shared_subscription(user_id, id).unwrap();
        assert!(db.list_shared_subscriptions(user_id).unwrap().is_empty());
    }

    #[test]
    fn test_shared_subscription_requires_known_platform() {
        let (db, user_id) = setup();
        let netflix = NewSubscription::new(user_id, "Netflix", 17000.0, date(2024, 7, 1));
        let sub_id = db.create_subscription(&netflix).unwrap();

        let seat = NewSharedSubscription::new(sub_id, 999, 4250.0);
        assert!(matches!(
            db.create_shared_subscription(user_id, &seat),
            Err(Error::NotFound(_))
        ));
    }
}
