use crate::ui::theme;
use owo_colors::OwoColorize;

pub fn success(label: &str) {
    println!("✅ {}", label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("❌ {}", label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("⚠️ {}", label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!("ℹ️ {}: {}", label.style(theme().info.clone()), value);
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}
