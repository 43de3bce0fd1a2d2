pub mod article;
pub mod author;

pub use article::Article;
pub use author::Author;
