//! UI controller: wires send and the settings form (open / save / cancel / restore)
//! to the settings store and the send pipeline. Owns the in-memory settings record.

use anyhow::Result;

use crate::assistant::Assistant;
use crate::capture::ScreenSources;
use crate::output::OutputSurface;
use crate::settings::{Settings, SettingsStore};
use crate::stream::StreamSummary;
use crate::window::{CloseAction, WindowHost, close_action};

/// Form state as typed by the user. Numeric fields stay text until saved.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsForm {
    pub api_key: String,
    pub api_host: String,
    pub model: String,
    pub temperature: String,
    pub top_p: String,
    pub presence_penalty: String,
    pub frequency_penalty: String,
    pub minimize_on_close: bool,
    pub always_on_top: bool,
    pub start_on_boot: bool,
}

impl SettingsForm {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            api_host: settings.api_host.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature.to_string(),
            top_p: settings.top_p.to_string(),
            presence_penalty: settings.presence_penalty.to_string(),
            frequency_penalty: settings.frequency_penalty.to_string(),
            minimize_on_close: settings.minimize_on_close,
            always_on_top: settings.always_on_top,
            start_on_boot: settings.start_on_boot,
        }
    }

    /// Unparsable numbers become NaN and are kept; there is no range validation.
    pub fn to_settings(&self) -> Settings {
        Settings {
            api_key: self.api_key.clone(),
            api_host: self.api_host.clone(),
            model: self.model.clone(),
            temperature: parse_number(&self.temperature),
            top_p: parse_number(&self.top_p),
            presence_penalty: parse_number(&self.presence_penalty),
            frequency_penalty: parse_number(&self.frequency_penalty),
            minimize_on_close: self.minimize_on_close,
            always_on_top: self.always_on_top,
            start_on_boot: self.start_on_boot,
        }
    }
}

fn parse_number(text: &str) -> f64 {
    text.trim().parse().unwrap_or(f64::NAN)
}

pub struct Controller<W, S> {
    assistant: Assistant<W, S>,
    store: SettingsStore,
    settings: Settings,
}

impl<W: WindowHost, S: ScreenSources> Controller<W, S> {
    pub fn new(assistant: Assistant<W, S>, store: SettingsStore) -> Self {
        let settings = store.load();
        assistant.window().set_always_on_top(settings.always_on_top);
        Self { assistant, store, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn window(&self) -> &W {
        self.assistant.window()
    }

    /// Send trigger (Enter in the input). No in-flight guard.
    pub async fn send<O>(&self, user_text: &str, output: &mut O) -> Option<StreamSummary>
    where
        O: OutputSurface + ?Sized,
    {
        self.assistant.ask(user_text, &self.settings, output).await
    }

    /// Loads the persisted values into a fresh form.
    pub fn open_settings(&self) -> SettingsForm {
        SettingsForm::from_settings(&self.store.load())
    }

    /// Persists the form wholesale and makes it the live record.
    pub fn save_settings(&mut self, form: &SettingsForm) -> Result<()> {
        let settings = form.to_settings();
        self.store.save(&settings)?;
        self.assistant.window().set_always_on_top(settings.always_on_top);
        self.settings = settings;
        Ok(())
    }

    /// Discards in-progress edits by reloading what is persisted.
    pub fn cancel_settings(&self) -> SettingsForm {
        self.open_settings()
    }

    /// Default values for the form. Nothing is persisted until `save_settings`.
    pub fn restore_defaults(&self) -> SettingsForm {
        SettingsForm::from_settings(&self.store.restore_defaults())
    }

    pub fn close_action(&self) -> CloseAction {
        close_action(&self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::testing::{SSE_HEAD, no_proxy_client, serve_once};
    use crate::capture::testing::FixedSources;
    use crate::output::BufferSurface;
    use crate::window::TerminalWindow;
    use std::time::Duration;

    fn controller(dir: &tempfile::TempDir) -> Controller<TerminalWindow, FixedSources> {
        let assistant = Assistant::with_client(
            no_proxy_client(),
            TerminalWindow::new(Duration::ZERO),
            FixedSources(vec![(4, 4)]),
        );
        Controller::new(assistant, SettingsStore::new(dir.path().join("settings.json")))
    }

    #[test]
    fn test_starts_with_defaults_and_applies_always_on_top() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);

        assert_eq!(controller.settings(), &Settings::default());
        assert!(controller.window().is_always_on_top());
        assert_eq!(controller.close_action(), CloseAction::Minimize);
    }

    #[test]
    fn test_save_persists_and_updates_live_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(&dir);

        let mut form = controller.open_settings();
        form.model = "gpt-4o-mini".into();
        form.temperature = "1.1".into();
        form.always_on_top = false;
        form.minimize_on_close = false;
        controller.save_settings(&form).unwrap();

        assert_eq!(controller.settings().model, "gpt-4o-mini");
        assert_eq!(controller.settings().temperature, 1.1);
        assert!(!controller.window().is_always_on_top());
        assert_eq!(controller.close_action(), CloseAction::Quit);
        assert_eq!(controller.open_settings(), form);
    }

    #[test]
    fn test_invalid_number_becomes_nan() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(&dir);

        let mut form = controller.open_settings();
        form.top_p = "lots".into();
        controller.save_settings(&form).unwrap();

        assert!(controller.settings().top_p.is_nan());
        assert_eq!(controller.settings().temperature, 0.7);
    }

    #[test]
    fn test_cancel_discards_edits() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(&dir);

        let mut saved = controller.open_settings();
        saved.api_key = "sk-saved".into();
        controller.save_settings(&saved).unwrap();

        let mut editing = controller.open_settings();
        editing.api_key = "sk-draft".into();

        assert_eq!(controller.cancel_settings().api_key, "sk-saved");
        assert_eq!(controller.settings().api_key, "sk-saved");
    }

    #[test]
    fn test_restore_defaults_is_not_persisted_until_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(&dir);

        let mut form = controller.open_settings();
        form.model = "custom".into();
        controller.save_settings(&form).unwrap();

        let restored = controller.restore_defaults();
        assert_eq!(restored, SettingsForm::from_settings(&Settings::default()));
        assert_eq!(controller.open_settings().model, "custom");

        controller.save_settings(&restored).unwrap();
        assert_eq!(controller.open_settings().model, "gpt-4o");
    }

    #[test]
    fn test_form_renders_numbers_plainly() {
        let form = SettingsForm::from_settings(&Settings::default());
        assert_eq!(form.temperature, "0.7");
        assert_eq!(form.top_p, "1");
        assert_eq!(form.to_settings(), Settings::default());
    }

    #[tokio::test]
    async fn test_send_uses_saved_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(&dir);
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n";
        let server = serve_once(SSE_HEAD, vec![body.as_bytes().to_vec()]).await;

        let mut form = controller.open_settings();
        form.api_host = server.api_host.clone();
        form.api_key = "sk-live".into();
        controller.save_settings(&form).unwrap();

        let mut output = BufferSurface::default();
        controller.send("", &mut output).await.unwrap();

        assert_eq!(output.answer, "ok");
        let request = server.request.await.unwrap().to_lowercase();
        assert!(request.contains("authorization: bearer sk-live"));
        assert!(request.contains("what's in this image?"));
    }
}
