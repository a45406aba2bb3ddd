use rust_i18n::t;
use teloxide::payloads::{EditMessageTextSetters, SendMessageSetters};
use teloxide::prelude::*;
use teloxide::types::{ChatId, LabeledPrice, MaybeInaccessibleMessage};

use crate::error::HandlerResult;
use crate::handlers::RequestContext;
use crate::services::payment::{PackageType, PaymentProvider};
use crate::state::AppState;
use crate::utils::keyboard;

pub(super) async fn handle_buy_requests(bot: &Bot, message: &MaybeInaccessibleMessage) -> HandlerResult<()> {
    info!("handle_callback_buy_requests");

    let services = &AppState::get()?.services;
    let packages = services.payment.packages();

    bot.edit_message_text(message.chat().id, message.id(), t!("messages.payment.choose_package"))
        .reply_markup(keyboard::get_packages_keyboard(&packages))
        .await?;

    Ok(())
}

pub(super) async fn handle_package_selected(
    bot: &Bot,
    message: &MaybeInaccessibleMessage,
    data: &str,
) -> HandlerResult<()> {
    info!("handle_callback_package_selected");

    let Some(raw) = data.strip_prefix("package:") else {
        return Ok(());
    };

    let package = match PackageType::parse(raw) {
        Ok(package_type) => AppState::get()?.services.payment.package_by_type(package_type),
        Err(_) => {
            bot.send_message(message.chat().id, t!("messages.payment.unknown_package"))
                .await?;
            return Ok(());
        }
    };

    bot.edit_message_text(
        message.chat().id,
        message.id(),
        t!("messages.payment.choose_method", package = package.name()),
    )
    .reply_markup(keyboard::get_payment_methods_keyboard(package.package_type.as_str()))
    .await?;

    Ok(())
}

pub(super) async fn handle_payment_method(
    bot: &Bot,
    message: &MaybeInaccessibleMessage,
    ctx: &RequestContext,
    data: &str,
) -> HandlerResult<()> {
    info!("handle_callback_payment_method");

    let mut parts = data.splitn(3, ':');
    let (Some(_), Some(method), Some(raw)) = (parts.next(), parts.next(), parts.next()) else {
        return Ok(());
    };

    let package_type = match PackageType::parse(raw) {
        Ok(package_type) => package_type,
        Err(_) => {
            bot.send_message(message.chat().id, t!("messages.payment.unknown_package"))
                .await?;
            return Ok(());
        }
    };

    match method {
        "stars" => send_stars_invoice(bot, message.chat().id, ctx, package_type).await,
        "yookassa" => send_yookassa_link(bot, message.chat().id, ctx, package_type).await,
        _ => Ok(()),
    }
}

/// Stars checkout: a pending payment row first, then the invoice whose
/// payload points back at it. The grant happens at finalize, never here.
async fn send_stars_invoice(
    bot: &Bot,
    chat_id: ChatId,
    ctx: &RequestContext,
    package_type: PackageType,
) -> HandlerResult<()> {
    let services = &AppState::get()?.services;

    let package = services.payment.package_by_type(package_type);
    let payment = services
        .payment
        .create_payment(ctx.telegram_user_id.0, package_type, PaymentProvider::Stars)
        .await?;

    let description = if package.is_subscription() {
        t!("messages.payment.invoice_description_subscription")
    } else {
        t!("messages.payment.invoice_description_package", package = package.name())
    };

    bot.send_invoice(
        chat_id,
        package.name(),
        description,
        format!("payment:{}", payment.id),
        "XTR",
        [LabeledPrice {
            label: package.name(),
            amount: package.price_stars,
        }],
    )
    .await?;

    Ok(())
}

/// YooKassa checkout: the redirect payment is created on their side and the
/// user gets the confirmation URL as a button. Finalization arrives through
/// the webhook.
async fn send_yookassa_link(
    bot: &Bot,
    chat_id: ChatId,
    ctx: &RequestContext,
    package_type: PackageType,
) -> HandlerResult<()> {
    let services = &AppState::get()?.services;

    let package = services.payment.package_by_type(package_type);
    let payment = services
        .payment
        .create_payment(ctx.telegram_user_id.0, package_type, PaymentProvider::Yookassa)
        .await?;

    let description = if package.is_subscription() {
        t!("messages.payment.invoice_description_subscription")
    } else {
        t!("messages.payment.invoice_description_package", package = package.name())
    };

    let created = match services
        .yookassa
        .create_payment(payment.amount, &description, payment.id, ctx.telegram_user_id.0)
        .await
    {
        Ok(created) => created,
        Err(e) => {
            error!("YooKassa payment creation failed: {:?}", e);
            services.payment.finalize_failure(payment.id).await?;
            bot.send_message(chat_id, t!("messages.payment.invoice_error")).await?;
            return Ok(());
        }
    };

    services
        .payment
        .attach_provider_payment_id(payment.id, &created.provider_payment_id)
        .await?;

    let url = reqwest::Url::parse(&created.confirmation_url)
        .map_err(|e| anyhow::anyhow!("Bad confirmation URL from YooKassa: {e}"))?;
    let label = t!("messages.payment.pay_button", amount = package.price_rub_display()).to_string();

    bot.send_message(chat_id, t!("messages.payment.yookassa_link", package = package.name()))
        .reply_markup(keyboard::get_payment_link_keyboard(label, url))
        .await?;

    Ok(())
}
