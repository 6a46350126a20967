//! Hierarchical extraction over a live browser session.
//!
//! A [`ContainerTree`] binds a declarative tree of locators to the page,
//! [`ExtractionTable`] collects row-aligned columns, a [`Paginator`] reveals
//! further pages, and [`Spider`] drives the extract/advance loop before the
//! table is persisted through [`output`].
pub mod container;
pub mod output;
pub mod pagination;
pub mod spider;
pub mod table;

pub use container::{ContainerBlueprint, ContainerId, ContainerTree, RowFilter, RowTemplate};
pub use pagination::{
    NextButton, PaginationConfig, PaginationKind, PaginationPhase, PaginationState,
    PaginationStrategy, Paginator, UrlTemplate,
};
pub use spider::{Harvester, RunPhase, Spider, SpiderOptions};
pub use table::ExtractionTable;
