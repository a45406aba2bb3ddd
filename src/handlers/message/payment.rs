use rust_i18n::t;
use teloxide::payloads::{AnswerPreCheckoutQuerySetters, SendMessageSetters};
use teloxide::prelude::*;
use teloxide::types::{Message, PreCheckoutQuery};

use crate::error::HandlerResult;
use crate::services::payment::{FinalizeOutcome, PaymentStatus};
use crate::state::AppState;
use crate::utils::{self, keyboard};

/// Invoice payloads carry our own payment row id as `payment:{id}`.
pub(crate) fn parse_payment_payload(payload: &str) -> Option<i64> {
    payload.strip_prefix("payment:")?.parse().ok()
}

/// Telegram asks for approval right before charging Stars; only payments we
/// created and have not finalized yet are approved.
pub(crate) async fn handle_pre_checkout(bot: Bot, q: PreCheckoutQuery) -> HandlerResult<()> {
    info!("handle_pre_checkout");

    let services = &AppState::get()?.services;

    let payment = match parse_payment_payload(&q.invoice_payload) {
        Some(payment_id) => services.payment.get_payment(payment_id).await?,
        None => None,
    };

    let ok = payment
        .map(|payment| payment.status == PaymentStatus::Pending)
        .unwrap_or(false);

    if ok {
        bot.answer_pre_checkout_query(q.id, true).await?;
    } else {
        warn!("Rejecting pre-checkout with payload {:?}", q.invoice_payload);
        bot.answer_pre_checkout_query(q.id, false)
            .error_message(t!("messages.payment.invoice_error"))
            .await?;
    }

    Ok(())
}

/// Client-side confirmation of a Stars payment. The finalize is idempotent,
/// so racing a provider notification for the same payment is harmless.
pub(crate) async fn handle_successful_payment(bot: Bot, msg: Message) -> HandlerResult<()> {
    info!("handle_successful_payment");

    let Some(payment) = msg.successful_payment() else {
        return Ok(());
    };

    let services = &AppState::get()?.services;

    let Some(payment_id) = parse_payment_payload(&payment.invoice_payload) else {
        warn!("Successful payment with unknown payload {:?}", payment.invoice_payload);
        return Ok(());
    };

    let outcome = services
        .payment
        .finalize_success(payment_id, Some(payment.telegram_payment_charge_id.0.as_str()))
        .await?;

    let text = match outcome {
        FinalizeOutcome::CreditsGranted { requests, .. } => {
            t!("messages.payment.succeeded_credits", count = requests)
        }
        FinalizeOutcome::SubscriptionExtended { until, .. } => {
            t!("messages.payment.succeeded_subscription", until = utils::format_local_date(until))
        }
        FinalizeOutcome::AlreadyProcessed => t!("messages.payment.already_processed"),
    };

    bot.send_message(msg.chat.id, text)
        .reply_markup(keyboard::get_back_to_menu_keyboard())
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_roundtrip() {
        assert_eq!(parse_payment_payload("payment:42"), Some(42));
        assert_eq!(parse_payment_payload("payment:abc"), None);
        assert_eq!(parse_payment_payload("order:42"), None);
        assert_eq!(parse_payment_payload(""), None);
    }
}
