//! Portal UI contract and the WebDriver implementation behind it
//!
//! The portal shows a filterable list of manuscript cards. Each card carries
//! a century label ("Siglo XIV"), a lock status, a code-entry field with an
//! unlock action, and, once unlocked, a download action. Locked cards for
//! the API-gated centuries additionally expose a documentation modal.
//!
//! [`ManuscriptPortal`] is the seam the flow driver sequences against; the
//! fantoccini-backed [`WebdriverPortal`] is the production implementation.

mod webdriver;

pub use webdriver::WebdriverPortal;

use crate::download::DownloadHandle;
use crate::error::Result;
use async_trait::async_trait;

/// Abstraction over the manuscripts portal UI, enabling testability.
///
/// All methods are scoped to a manuscript card identified by its century
/// label, except the banner check, which inspects the page at large.
#[async_trait]
pub trait ManuscriptPortal: Send {
    /// Apply the century filter control
    async fn filter_by_century(&mut self, century: &str) -> Result<()>;

    /// Verify the card is locked: code input, unlock button, and help text
    /// present. When `expect_documentation` is set, also open and close the
    /// card's documentation modal.
    async fn verify_locked(&mut self, century: &str, expect_documentation: bool) -> Result<()>;

    /// Verify the card is unlocked: status label and download button present
    async fn verify_unlocked(&mut self, century: &str) -> Result<()>;

    /// Fill the card's code field with `code` and click unlock.
    ///
    /// When `used_api` is set, the portal follows a successful unlock with a
    /// confirmation modal that must be closed before the card re-renders.
    async fn unlock_with_code(&mut self, century: &str, code: &str, used_api: bool) -> Result<()>;

    /// Read the card's book title
    async fn book_title(&mut self, century: &str) -> Result<String>;

    /// Click the card's download action and wait, bounded, for the PDF to
    /// land on disk
    async fn trigger_download(&mut self, century: &str) -> Result<DownloadHandle>;

    /// Whether the in-page download error banner is visible
    async fn download_error_banner_visible(&mut self) -> Result<bool>;
}

/// XPath/CSS selectors for the portal markup
pub(crate) mod selectors {
    /// Portal page heading, used to confirm the portal rendered
    pub const PAGE_TITLE: &str = "h1.text-2xl.font-bold.text-sherpa-text";

    /// Close button shared by the documentation and unlock-confirmation modals
    pub const MODAL_CLOSE: &str = r#"button[aria-label="Cerrar modal"]"#;

    /// In-page download error banner
    pub const ERROR_BANNER: &str =
        r#"//p[contains(@class, "text-red-400")][contains(., "Error al descargar el archivo")]"#;

    /// Century filter dropdown (sibling of its label)
    pub const CENTURY_FILTER: &str =
        r#"//label[contains(., "Filtrar por Siglo")]/following-sibling::div//select"#;

    /// Card container for the manuscript labeled with `century`
    pub fn card(century: &str) -> String {
        format!(r#"//span[contains(., "Siglo {}")]/ancestor::*[3]"#, century)
    }

    /// "Desbloqueado" status label within a card
    pub fn unlocked_status(century: &str) -> String {
        format!(r#"{}//span[contains(., "Desbloqueado")]"#, card(century))
    }

    /// "Descargar PDF" button within a card
    pub fn download_button(century: &str) -> String {
        format!(r#"{}//button[contains(., "Descargar PDF")]"#, card(century))
    }

    /// Code-entry field within a card
    pub fn code_input(century: &str) -> String {
        format!(r#"{}//input[@placeholder="Ingresá el código"]"#, card(century))
    }

    /// "Desbloquear" button within a card
    pub fn unlock_button(century: &str) -> String {
        format!(r#"{}//button[contains(., "Desbloquear")]"#, card(century))
    }

    /// "Ver Documentación" button within a card
    pub fn documentation_button(century: &str) -> String {
        format!(r#"{}//button[contains(., "Ver Documentación")]"#, card(century))
    }

    /// Locked-card help text pointing at the previous manuscript's code
    pub fn help_text(century: &str) -> String {
        format!(
            r#"{}//p[contains(., "Necesitás el código del manuscrito anterior")]"#,
            card(century)
        )
    }

    /// Book title heading within a card
    pub fn book_title(century: &str) -> String {
        format!(r#"{}//h3"#, card(century))
    }
}
