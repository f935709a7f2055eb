pub mod arxiv;
pub mod duckduckgo;
pub mod perplexity;
pub mod searxng;
pub mod tavily;

pub use arxiv::ArxivProvider;
pub use duckduckgo::DuckduckgoProvider;
pub use perplexity::PerplexityProvider;
pub use searxng::SearxngProvider;
pub use tavily::TavilyProvider;
