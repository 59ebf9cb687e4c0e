// Library root for the stats catalog builder: data model, normalization,
// catalog assembly, persistence and the read-side query facade.

pub mod assemble;
pub mod catalog;
pub mod export;
pub mod model;
pub mod normalize;
pub mod options;
pub mod query;
pub mod source;
pub mod table;
pub mod writer;
