pub mod bfs;
pub mod single;

#[cfg(test)]
pub(crate) mod testing;

pub use bfs::BfsCrawler;
pub use single::capture_page;
