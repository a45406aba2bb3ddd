use teloxide::types::{Update, User};

pub fn extract_user(update: &Update) -> Option<User> {
    update.from().cloned()
}
