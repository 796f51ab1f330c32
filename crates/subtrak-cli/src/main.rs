//! SubTrak CLI - Subscription tracker
//!
//! Usage:
//!   subtrak init                        Initialize database
//!   subtrak detect --account 1 --import Find and import recurring charges
//!   subtrak dashboard                   Monthly spend overview
//!   subtrak maintain                    Daily rollover and reminders

mod cli;
mod commands;


use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use subtrak_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    if let Commands::Init = cli.command {
        return commands::cmd_init(&cli.db, &cli.user, cli.no_encrypt);
    }
    if let Commands::Status = cli.command {
        return commands::cmd_status(&cli.db, cli.no_encrypt);
    }

    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    let db = commands::open_db(&cli.db, cli.no_encrypt)?;
    let user_id = commands::resolve_user(&db, &cli.user)?;
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Init | Commands::Status => Ok(()),
        Commands::Subscriptions { action } => match action {
            None => commands::cmd_subscriptions_list(&db, user_id, false, None, None),
            Some(SubscriptionsAction::List {
                all,
                category,
                card,
            }) => commands::cmd_subscriptions_list(
                &db,
                user_id,
                all,
                category.as_deref(),
                card.as_deref(),
            ),
            Some(SubscriptionsAction::Add {
                name,
                amount,
                cycle,
                next,
                currency,
                category,
                card,
                cancel_url,
                notes,
            }) => commands::cmd_subscriptions_add(
                &db,
                user_id,
                commands::NewSubscriptionArgs {
                    name,
                    amount,
                    cycle,
                    next,
                    currency,
                    category,
                    card,
                    cancel_url,
                    notes,
                },
            ),
            Some(SubscriptionsAction::Update {
                name_or_id,
                name,
                amount,
                currency,
                cycle,
                next,
                category,
                card,
                cancel_url,
                notes,
                note,
            }) => commands::cmd_subscriptions_update(
                &db,
                user_id,
                &name_or_id,
                commands::UpdateSubscriptionArgs {
                    name,
                    amount,
                    currency,
                    cycle,
                    next,
                    category,
                    card,
                    cancel_url,
                    notes,
                },
                note.as_deref(),
            ),
            Some(SubscriptionsAction::Cancel { name_or_id, reason }) => {
                commands::cmd_subscriptions_cancel(&db, user_id, &name_or_id, reason.as_deref())
            }
            Some(SubscriptionsAction::Remove { name_or_id }) => {
                commands::cmd_subscriptions_remove(&db, user_id, &name_or_id)
            }
            Some(SubscriptionsAction::History { name_or_id }) => {
                commands::cmd_subscriptions_history(&db, user_id, &name_or_id)
            }
            Some(SubscriptionsAction::Checklist { card }) => {
                commands::cmd_subscriptions_checklist(&db, user_id, &card)
            }
        },
        Commands::Detect {
            file,
            account,
            shape,
            months,
            import,
            card,
            json,
        } => {
            let source = match (file, account) {
                (Some(path), _) => commands::DetectSource::File {
                    path,
                    shape: commands::parse_shape(&shape)?,
                    card,
                },
                (None, Some(id)) => commands::DetectSource::Account(id),
                (None, None) => anyhow::bail!("Specify --file or --account"),
            };
            let options = commands::DetectOptions {
                months: months.unwrap_or(config.aggregator.default_months_back),
                import,
                json,
            };
            commands::cmd_detect(&db, user_id, &config, source, &options, today).await
        }
        Commands::Import { file, card } => {
            commands::cmd_import(&db, user_id, &file, card.as_deref(), today)
        }
        Commands::Dashboard { days, json } => commands::cmd_dashboard(
            &db,
            user_id,
            today,
            days.unwrap_or(config.dashboard.upcoming_days),
            json,
        ),
        Commands::Upcoming { days } => commands::cmd_upcoming(&db, user_id, today, days),
        Commands::Calendar { month } => {
            commands::cmd_calendar(&db, user_id, month.as_deref(), today)
        }
        Commands::Savings => commands::cmd_savings(&db, user_id),
        Commands::Maintain { json } => commands::cmd_maintain(&db, &config, today, json),
        Commands::Categories { action } => match action {
            None | Some(CategoriesAction::List) => commands::cmd_categories_list(&db, user_id),
            Some(CategoriesAction::Add { name, color, icon }) => {
                commands::cmd_categories_add(&db, user_id, &name, color.as_deref(), icon.as_deref())
            }
            Some(CategoriesAction::Update {
                category,
                name,
                color,
                icon,
            }) => commands::cmd_categories_update(
                &db,
                user_id,
                &category,
                name.as_deref(),
                color.as_deref(),
                icon.as_deref(),
            ),
            Some(CategoriesAction::Delete { category }) => {
                commands::cmd_categories_delete(&db, user_id, &category)
            }
        },
        Commands::Cards { action } => match action {
            None | Some(CardsAction::List) => commands::cmd_cards_list(&db, user_id),
            Some(CardsAction::Add {
                name,
                last4,
                r#type,
                expiry,
                notes,
            }) => commands::cmd_cards_add(
                &db,
                user_id,
                &name,
                last4.as_deref(),
                &r#type,
                expiry.as_deref(),
                notes.as_deref(),
            ),
            Some(CardsAction::Retire { card }) => commands::cmd_cards_retire(&db, user_id, &card),
            Some(CardsAction::Delete { card }) => commands::cmd_cards_delete(&db, user_id, &card),
        },
        Commands::Accounts { action } => match action {
            None | Some(AccountsAction::List) => commands::cmd_accounts_list(&db, user_id),
            Some(AccountsAction::Add {
                institution,
                org,
                connected_id,
                r#type,
                number,
            }) => commands::cmd_accounts_add(
                &db,
                user_id,
                &institution,
                &org,
                &connected_id,
                &r#type,
                number.as_deref(),
            ),
            Some(AccountsAction::Remove { id }) => commands::cmd_accounts_remove(&db, user_id, id),
            Some(AccountsAction::Cards { id, save }) => {
                commands::cmd_accounts_cards(&db, user_id, &config, id, save).await
            }
        },
        Commands::Members { action } => match action {
            MembersAction::List { subscription } => {
                commands::cmd_members_list(&db, user_id, &subscription)
            }
            MembersAction::Add {
                subscription,
                name,
                email,
                amount,
                percent,
                owner,
            } => commands::cmd_members_add(
                &db,
                user_id,
                &subscription,
                &name,
                commands::MemberArgs {
                    email,
                    amount,
                    percent,
                    owner: Some(owner),
                    ..Default::default()
                },
            ),
            MembersAction::Update {
                subscription,
                member,
                name,
                email,
                amount,
                percent,
                owner,
            } => commands::cmd_members_update(
                &db,
                user_id,
                &subscription,
                member,
                commands::MemberArgs {
                    name,
                    email,
                    amount,
                    percent,
                    owner,
                },
            ),
            MembersAction::Remove {
                subscription,
                member,
            } => commands::cmd_members_remove(&db, user_id, &subscription, member),
        },
        Commands::Sharing { action } => match action {
            None | Some(SharingAction::List) => commands::cmd_sharing_list(&db, user_id),
            Some(SharingAction::Platforms) => commands::cmd_sharing_platforms(&db),
            Some(SharingAction::AddPlatform {
                name,
                url,
                description,
            }) => commands::cmd_sharing_add_platform(
                &db,
                &name,
                url.as_deref(),
                description.as_deref(),
            ),
            Some(SharingAction::Join {
                subscription,
                platform,
                cost,
                members,
                role,
                status,
                deposit,
                fee,
                external_id,
                notes,
            }) => commands::cmd_sharing_join(
                &db,
                user_id,
                commands::JoinArgs {
                    subscription,
                    platform,
                    cost,
                    members,
                    role,
                    status,
                    deposit,
                    fee,
                    external_id,
                    notes,
                },
            ),
            Some(SharingAction::Update {
                id,
                cost,
                members,
                role,
                status,
                fee,
                notes,
            }) => commands::cmd_sharing_update(
                &db,
                user_id,
                id,
                commands::SharedUpdateArgs {
                    cost,
                    members,
                    role,
                    status,
                    fee,
                    notes,
                },
            ),
            Some(SharingAction::Remove { id }) => commands::cmd_sharing_remove(&db, user_id, id),
        },
    }
}
