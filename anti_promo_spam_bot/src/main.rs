use group_bot_commons::*;

fn main() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "warn,anti_promo_spam_bot=debug");
    }
    start_everything(anti_promo_spam_bot::entry());
}
