//! Fixed names shared by the source payload, the transform rules and the
//! destination table. These are part of the data contract, not configuration.

/// Top-level key holding the record array in the source document.
pub const COLLECTION_KEY: &str = "dataSekolah";

pub const STATUS_FIELD: &str = "status";
pub const CATEGORY_FIELD: &str = "bentuk";
pub const NAME_FIELD: &str = "sekolah";
pub const STREET_FIELD: &str = "alamat_jalan";
pub const LATITUDE_FIELD: &str = "lintang";
pub const LONGITUDE_FIELD: &str = "bujur";
/// National school id, used to identify rejected records.
pub const ID_FIELD: &str = "npsn";

/// `N` (negeri) marks a public school.
pub const PUBLIC_MARKER: &str = "N";
/// `SMA` (sekolah menengah atas) is the high-school category.
pub const HIGH_SCHOOL_MARKER: &str = "SMA";

pub const ADDRESS_FIELD: &str = "school_address";
pub const ADDRESS_SEPARATOR: &str = " - ";

pub const DESTINATION_NAMESPACE: &str = "hijir";
pub const DESTINATION_TABLE: &str = "target_table";
