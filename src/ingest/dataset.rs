use std::collections::BTreeMap;

use lazy_static::lazy_static;

lazy_static! {
    /// IRIS topic (inbox subdirectory name) to warehouse table.  Fixed at
    /// process start; a subdirectory not listed here is skipped with a
    /// warning.
    pub static ref DATASET_TABLES: BTreeMap<&'static str, &'static str> = {
        let mut m = BTreeMap::new();
        m.insert("FREQ", "bmrs_freq");
        m.insert("FUELINST", "bmrs_fuelinst_iris");
        m.insert("INDGEN", "bmrs_indgen_iris");
        m.insert("COSTS", "bmrs_costs_iris");
        m.insert("BOALF", "bmrs_boalf_iris");
        m.insert("MELS", "bmrs_mels_iris");
        m.insert("SYSWARN", "bmrs_syswarn_iris");
        m.insert("REMIT", "bmrs_remit_iris");
        m
    };
}

pub fn table_for(dataset: &str) -> Option<&'static str> {
    DATASET_TABLES.get(dataset).copied()
}
