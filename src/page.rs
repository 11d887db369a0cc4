use serde_json::Value;

use crate::command::{execute, Command, Response};
use crate::error::PetError;
use crate::pet::PetRuntime;
use crate::render::Surface;

/// Pages the runtime can never be loaded into.
const RESTRICTED_PREFIXES: [&str; 2] = ["chrome://", "chrome-extension://"];

pub fn is_restricted(url: &str) -> bool {
    RESTRICTED_PREFIXES.iter().any(|p| url.starts_with(p))
}

/// Message path from the relay or popup into one page.
pub trait PageChannel {
    fn url(&self) -> &str;

    /// Deliver a command. `Err(Unreachable)` when no runtime is listening on the page.
    fn send(&mut self, cmd: &Command) -> Result<Response, PetError>;

    /// Load the runtime into the page if it isn't there yet.
    fn inject(&mut self) -> Result<(), PetError>;
}

/// Builds a runtime for a page on injection.
pub type Loader<S> = Box<dyn FnMut() -> PetRuntime<S>>;

/// A page in this process, with its runtime loaded or not.
pub struct LocalPage<S: Surface> {
    url: String,
    runtime: Option<PetRuntime<S>>,
    loader: Loader<S>,
}

impl<S: Surface> LocalPage<S> {
    /// A page whose runtime has not been loaded yet.
    pub fn new(url: impl Into<String>, loader: Loader<S>) -> Self {
        Self {
            url: url.into(),
            runtime: None,
            loader,
        }
    }

    /// A page with the runtime loaded and booted, as on a normal page load.
    pub fn loaded(url: impl Into<String>, loader: Loader<S>) -> Result<Self, PetError> {
        let mut page = Self::new(url, loader);
        page.inject()?;
        Ok(page)
    }

    pub fn runtime(&self) -> Option<&PetRuntime<S>> {
        self.runtime.as_ref()
    }

    pub fn runtime_mut(&mut self) -> Option<&mut PetRuntime<S>> {
        self.runtime.as_mut()
    }

    /// Navigate away: the runtime gets its unload and is dropped.
    pub fn navigate(&mut self, url: impl Into<String>) {
        if let Some(mut rt) = self.runtime.take() {
            rt.unload();
        }
        self.url = url.into();
    }
}

impl<S: Surface> PageChannel for LocalPage<S> {
    fn url(&self) -> &str {
        &self.url
    }

    fn send(&mut self, cmd: &Command) -> Result<Response, PetError> {
        let rt = self
            .runtime
            .as_mut()
            .ok_or_else(|| PetError::Unreachable(self.url.clone()))?;
        let msg: Value =
            serde_json::to_value(cmd).map_err(|e| PetError::Malformed(e.to_string()))?;
        Ok(execute(rt, &msg))
    }

    fn inject(&mut self) -> Result<(), PetError> {
        if is_restricted(&self.url) {
            return Err(PetError::Unreachable(format!(
                "cannot inject script on {}",
                self.url
            )));
        }
        if self.runtime.is_some() {
            return Ok(());
        }
        let mut rt = (self.loader)();
        rt.boot()?;
        log::info!("Runtime loaded on {}", self.url);
        self.runtime = Some(rt);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pet::animation::Registry;
    use crate::render::headless::HeadlessSurface;
    use crate::settings::{MemoryStore, SettingsStore};
    use std::rc::Rc;

    fn loader(store: &Rc<MemoryStore>) -> Loader<HeadlessSurface> {
        let store: Rc<dyn SettingsStore> = store.clone();
        Box::new(move || {
            PetRuntime::new(
                store.clone(),
                HeadlessSurface::new(800.0, 600.0),
                Registry::builtin(),
            )
        })
    }

    #[test]
    fn restricted_urls() {
        assert!(is_restricted("chrome://extensions"));
        assert!(is_restricted("chrome-extension://abc/popup.html"));
        assert!(!is_restricted("https://example.com"));
    }

    #[test]
    fn unloaded_page_is_unreachable_until_injected() {
        let store = Rc::new(MemoryStore::new());
        let mut page = LocalPage::new("https://example.com", loader(&store));
        assert!(matches!(
            page.send(&Command::Ping),
            Err(PetError::Unreachable(_))
        ));
        page.inject().unwrap();
        assert_eq!(page.send(&Command::EnablePet).unwrap(), Response::ok());
        assert!(page.runtime().unwrap().is_enabled());
    }

    #[test]
    fn restricted_page_refuses_injection() {
        let store = Rc::new(MemoryStore::new());
        let mut page = LocalPage::new("chrome://settings", loader(&store));
        assert!(page.inject().is_err());
        assert!(page.runtime().is_none());
    }

    #[test]
    fn navigation_unloads_and_saves_position() {
        let store = Rc::new(MemoryStore::new());
        let mut page = LocalPage::loaded("https://a.example", loader(&store)).unwrap();
        page.send(&Command::EnablePet).unwrap();
        page.navigate("https://b.example");
        assert!(page.runtime().is_none());
        assert_eq!(page.url(), "https://b.example");
        assert_eq!(store.write_count(), 1);
    }
}
