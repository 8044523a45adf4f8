//! Theme registry, package service seam and theme coordination.

pub mod coordinator;
pub mod defaults;
pub mod packages;
pub mod registry;
pub mod types;

pub use coordinator::{ThemeCoordinator, ThemeOptions, UpdateReport};
pub use packages::{DetachedPackageService, InstalledPackage, PackageService};
pub use registry::{JsonThemeRegistry, ThemeRegistry};
pub use types::{ThemeDescriptor, ThemeError, ThemesDocument, DEFAULT_THEME_ID};
