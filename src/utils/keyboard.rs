use rust_i18n::t;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::services::payment::Package;

pub fn get_main_menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([
        [InlineKeyboardButton::callback(t!("buttons.profile"), "profile_menu")],
        [InlineKeyboardButton::callback(t!("buttons.help"), "help_menu")],
    ])
}

pub fn get_interview_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([
        [InlineKeyboardButton::callback(t!("buttons.interview_skip"), "interview_skip")],
        [InlineKeyboardButton::callback(t!("buttons.cancel"), "interview_cancel")],
    ])
}

/// One row per option, then skip/cancel. Callback data carries the option
/// index; the option text itself lives in the session.
pub fn get_interview_options_keyboard(options: &[String]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = options
        .iter()
        .enumerate()
        .map(|(idx, option)| vec![InlineKeyboardButton::callback(option.clone(), format!("interview_opt_{idx}"))])
        .collect();

    rows.push(vec![InlineKeyboardButton::callback(
        t!("buttons.interview_skip"),
        "interview_skip",
    )]);
    rows.push(vec![InlineKeyboardButton::callback(t!("buttons.cancel"), "interview_cancel")]);

    InlineKeyboardMarkup::new(rows)
}

pub fn get_plan_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([
        vec![
            InlineKeyboardButton::callback(t!("buttons.plan_confirm"), "plan_confirm"),
            InlineKeyboardButton::callback(t!("buttons.plan_modify"), "plan_modify"),
        ],
        vec![InlineKeyboardButton::callback(t!("buttons.cancel"), "plan_cancel")],
    ])
}

pub fn get_profile_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([
        [InlineKeyboardButton::callback(t!("buttons.buy_requests"), "buy_requests")],
        [InlineKeyboardButton::callback(t!("buttons.main_menu"), "main_menu")],
    ])
}

pub fn get_packages_keyboard(packages: &[Package]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = packages
        .iter()
        .map(|package| {
            vec![InlineKeyboardButton::callback(
                package.name(),
                format!("package:{}", package.package_type.as_str()),
            )]
        })
        .collect();

    rows.push(vec![InlineKeyboardButton::callback(t!("buttons.back"), "profile_menu")]);

    InlineKeyboardMarkup::new(rows)
}

pub fn get_payment_methods_keyboard(package_type: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([
        vec![InlineKeyboardButton::callback(
            t!("buttons.pay_stars"),
            format!("pay:stars:{package_type}"),
        )],
        vec![InlineKeyboardButton::callback(
            t!("buttons.pay_yookassa"),
            format!("pay:yookassa:{package_type}"),
        )],
        vec![InlineKeyboardButton::callback(t!("buttons.back"), "buy_requests")],
    ])
}

pub fn get_payment_link_keyboard(label: String, url: reqwest::Url) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[InlineKeyboardButton::url(label, url)]])
}

pub fn get_back_to_menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[InlineKeyboardButton::callback(t!("buttons.main_menu"), "main_menu")]])
}
