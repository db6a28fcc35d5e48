//! The payload module contains the components responsible for decoding the
//! data records carried inside a wM-Bus telegram.

pub mod data_encoding;
pub mod index;
pub mod record;
pub mod vif;
pub mod vif_maps;

pub use index::{DoubleValue, DvKey, RecordIndex};
pub use record::{parse_dv_records, DecodedValue, DvParseResult, DvRecord, RecordError};
pub use vif::VifInfo;
