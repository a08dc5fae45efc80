//! # Localization Tests
//!
//! Message retrieval, argument formatting, language resolution and the
//! keyboard button matching used by the bot.

use property_bot::localization::{matches_any_language, LocalizationManager, DEFAULT_LANGUAGE};
use property_bot::text_processing::parse_property_block;
use std::collections::HashMap;

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    #[test]
    fn test_supported_languages() {
        let manager = setup_localization();
        assert_eq!(manager.supported_languages(), vec!["en", "ru"]);
        assert_eq!(DEFAULT_LANGUAGE, "ru");
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("wizard-cancelled", "ru", None);
        assert_eq!(message, "Создание объекта отменено.");

        let message = manager.get_message_in_language("wizard-cancelled", "en", None);
        assert_eq!(message, "Property creation cancelled.");
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "ru", None);
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_unsupported_language_falls_back_to_russian() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("button-consent", "de", None);
        assert_eq!(message, "Согласен ✅");
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("count", "3");
        let message = manager.get_message_in_language("photo-accepted", "ru", Some(&args));
        assert_eq!(
            message,
            "Фото принято (3). Отправьте еще фото или напишите \"Готово\"."
        );
    }

    #[test]
    fn test_urls_are_not_wrapped_in_isolation_marks() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("url", "https://crm.example.com/?telegramUserId=1");
        let message = manager.get_message_in_language("open-client-link", "ru", Some(&args));
        assert_eq!(message, "Открыть клиент: https://crm.example.com/?telegramUserId=1");
    }

    #[test]
    fn test_resolve_language() {
        let manager = setup_localization();

        assert_eq!(manager.resolve_language(Some("en-GB")), "en");
        assert_eq!(manager.resolve_language(Some("RU")), "ru");
        assert_eq!(manager.resolve_language(Some("pl")), "ru");
        assert_eq!(manager.resolve_language(None), "ru");
    }

    #[test]
    fn test_button_matching_accepts_every_language() {
        assert!(matches_any_language("button-consent", "Согласен ✅"));
        assert!(matches_any_language("button-consent", "I agree ✅"));
        assert!(matches_any_language("button-show-links", " Показать ссылки "));
        assert!(!matches_any_language("button-show-links", "Показать"));
    }

    #[test]
    fn test_every_language_has_the_same_keys() {
        let ru = include_str!("../locales/ru/main.ftl");
        let en = include_str!("../locales/en/main.ftl");
        let keys = |source: &str| -> Vec<String> {
            let mut keys: Vec<String> = source
                .lines()
                .filter(|line| !line.starts_with('#') && !line.trim().is_empty())
                .filter_map(|line| line.split_once(" = ").map(|(key, _)| key.to_string()))
                .collect();
            keys.sort();
            keys
        };
        assert_eq!(keys(ru), keys(en));
    }

    #[test]
    fn test_labels_form_a_parseable_block() {
        let manager = setup_localization();

        for language in manager.supported_languages() {
            let label = |key: &str| manager.get_message_in_language(key, language, None);
            let block = format!(
                "{}: Варшава\n{}: ул. Тестовая 1\n{}: 100\n{}: 2000\n{}: 15\n{}: 5\n{}: тест",
                label("label-city"),
                label("label-address"),
                label("label-area"),
                label("label-total"),
                label("label-rate"),
                label("label-service"),
                label("label-description"),
            );
            let parsed = parse_property_block(&block)
                .unwrap_or_else(|| panic!("{language} labels should parse"));
            assert_eq!(parsed.rent_rate, 15.0, "{language}");
            assert_eq!(parsed.service_rate, 5.0, "{language}");
        }
    }
}
