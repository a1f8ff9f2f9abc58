//! # void_serial - Object Graph Serialization
//!
//! Encodes arbitrary, possibly cyclic graphs of objects, arrays and atoms
//! into flat JSON text and rebuilds an equivalent graph from it, including
//! shared references, cycles and registered behaviors.
//!
//! ## Format
//!
//! ```text
//! [ {"#": "Player", "name": "ada", "pos": {"#": 1}, "self": {"#": 0}},
//!   {"x": 1, "y": {"#.": "Number", "#v": "NaN"}} ]
//! ```
//!
//! - Every composite becomes one entry of the node table, root first.
//! - `{"#": n}` references entry `n`; `{"#": -1}` is undefined.
//! - `{"#.": name, "#v": args}` rebuilds an atom JSON cannot hold.
//! - `"#": "Player"` on an entry names a registered type.
//!
//! ## Example
//!
//! ```
//! use void_serial::prelude::*;
//!
//! let codec = GraphCodec::default();
//!
//! let node = Value::object();
//! node.set("next", node.clone());
//!
//! let text = codec.encode(&node)?;
//! assert_eq!(text, r##"[{"next":{"#":0}}]"##);
//!
//! let back = codec.decode(&text)?;
//! assert!(back.get("next").unwrap().same(&back));
//! # Ok::<(), void_serial::CodecError>(())
//! ```

pub mod atom;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod markers;
pub mod namespace;
pub mod registry;
pub mod rehydrate;
pub mod snapshot;
pub mod table;
pub mod value;
pub mod walker;

pub mod prelude {
    pub use crate::atom::{AtomChain, AtomCodec, HostNodeCodec};
    pub use crate::config::CodecConfig;
    pub use crate::engine::GraphCodec;
    pub use crate::error::{CodecError, Result};
    pub use crate::filter::FieldFilter;
    pub use crate::namespace::Namespace;
    pub use crate::registry::{Behavior, TypeRegistry};
    pub use crate::snapshot::{clone_graph, Snapshot};
    pub use crate::table::Document;
    pub use crate::value::{HostNode, MarkupNode, NativeFunction, Object, Pattern, Value};
}

pub use prelude::*;
