use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use rust_i18n::t;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::Bot;

use crate::error::HandlerResult;
use crate::services::payment::{FinalizeOutcome, PaymentProvider, WebhookNotification};
use crate::state::AppState;
use crate::utils;

pub fn router(bot: Bot) -> Router {
    Router::new()
        .route("/webhooks/yookassa", post(handle_yookassa))
        .with_state(bot)
}

/// YooKassa retries any non-2xx response, so internal failures are logged and
/// swallowed; the finalize step is idempotent either way.
async fn handle_yookassa(State(bot): State<Bot>, Json(notification): Json<WebhookNotification>) -> StatusCode {
    if let Err(e) = process_notification(&bot, &notification).await {
        error!(
            "Failed to process YooKassa webhook for payment {}: {:?}",
            notification.object.id, e
        );
    }

    StatusCode::OK
}

async fn process_notification(bot: &Bot, notification: &WebhookNotification) -> HandlerResult<()> {
    let services = &AppState::get()?.services;

    let payment = match notification.object.internal_payment_id() {
        Some(id) => services.payment.get_payment(id).await?,
        None => services.payment.find_by_provider_id(&notification.object.id).await?,
    };

    let Some(payment) = payment else {
        warn!("YooKassa webhook for unknown payment {}", notification.object.id);
        return Ok(());
    };

    if payment.provider != PaymentProvider::Yookassa.as_str() {
        warn!("YooKassa webhook for a {} payment {}", payment.provider, payment.id);
        return Ok(());
    }

    match notification.event.as_str() {
        "payment.succeeded" => {
            let outcome = services.payment.finalize_success(payment.id, None).await?;
            notify_user(bot, &outcome).await;
        }
        "payment.canceled" => {
            services.payment.finalize_failure(payment.id).await?;
        }
        other => debug!("Ignoring YooKassa event {other}"),
    }

    Ok(())
}

async fn notify_user(bot: &Bot, outcome: &FinalizeOutcome) {
    let (telegram_id, text) = match outcome {
        FinalizeOutcome::AlreadyProcessed => return,
        FinalizeOutcome::CreditsGranted { telegram_id, requests } => {
            (*telegram_id, t!("messages.payment.succeeded_credits", count = requests))
        }
        FinalizeOutcome::SubscriptionExtended { telegram_id, until } => (
            *telegram_id,
            t!("messages.payment.succeeded_subscription", until = utils::format_local_date(*until)),
        ),
    };

    if let Err(e) = bot.send_message(ChatId(telegram_id as i64), text).await {
        warn!("Failed to notify user {telegram_id} about payment: {:?}", e);
    }
}
