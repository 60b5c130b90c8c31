//! Protocol constant tables from MS-OXPROPS / MS-OXMSG.

pub mod property_sets;
pub mod tags;
