mod codec;
mod convert;
mod dataset;
mod midi_importer;
mod midi_writer;
mod model;
mod util;

pub use codec::error::*;
pub use codec::quantize::*;
pub use codec::split::*;
pub use codec::sustain::*;
pub use codec::vocab::*;
pub use codec::*;
pub use convert::*;
pub use dataset::*;
pub use midi_importer::*;
pub use midi_writer::*;
pub use model::config::*;
pub use model::performance::*;
pub use util::*;
