pub mod article;
pub mod cover;
pub mod publish;
pub mod topic;

pub use article::ArticleGenerator;
pub use cover::CoverArtist;
pub use publish::Publisher;
pub use topic::TopicSelector;
