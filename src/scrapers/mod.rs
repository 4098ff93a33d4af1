pub mod browser;
pub mod cards;
pub mod http;
pub mod traits;

pub use browser::BrowserSource;
pub use cards::split_cards;
pub use http::HttpSource;
pub use traits::FragmentSource;
