//! Typed sub-entities a classified message carries: appointment, task,
//! contact and follow-up flag details. Each is a thin view over the
//! message's property bag, read once when first asked for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::named_props::NamedPropertyMap;
use crate::oxprops::property_sets::PropertySet;
use crate::oxprops::tags;
use crate::properties::PropertyBag;

/// Calendar details of an appointment or meeting message.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Appointment {
    pub location: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Appointment {
    pub(crate) fn read(bag: &PropertyBag, named: &NamedPropertyMap) -> Result<Self> {
        let set = PropertySet::Appointment;
        Ok(Self {
            location: named_string(bag, named, set, tags::LID_LOCATION)?,
            start: named_datetime(bag, named, set, tags::LID_APPOINTMENT_START)?,
            end: named_datetime(bag, named, set, tags::LID_APPOINTMENT_END)?,
        })
    }
}

/// Details of a task message.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Task {
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub complete: Option<bool>,
}

impl Task {
    pub(crate) fn read(bag: &PropertyBag, named: &NamedPropertyMap) -> Result<Self> {
        let set = PropertySet::Task;
        Ok(Self {
            start_date: named_datetime(bag, named, set, tags::LID_TASK_START_DATE)?,
            due_date: named_datetime(bag, named, set, tags::LID_TASK_DUE_DATE)?,
            complete: named_boolean(bag, named, set, tags::LID_TASK_COMPLETE)?,
        })
    }
}

/// Details of a contact card message.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Contact {
    pub display_name: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub business_phone: Option<String>,
    pub mobile_phone: Option<String>,
}

impl Contact {
    pub(crate) fn read(bag: &PropertyBag) -> Result<Self> {
        Ok(Self {
            display_name: bag.string(tags::PR_DISPLAY_NAME)?,
            company: bag.string(tags::PR_COMPANY_NAME)?,
            job_title: bag.string(tags::PR_TITLE)?,
            business_phone: bag.string(tags::PR_BUSINESS_TELEPHONE_NUMBER)?,
            mobile_phone: bag.string(tags::PR_CELLULAR_TELEPHONE_NUMBER)?,
        })
    }
}

/// PR_FLAG_STATUS values, [MS-OXOFLAG].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FlagStatus {
    Complete,
    Marked,
}

impl FlagStatus {
    fn from_property(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Complete),
            2 => Some(Self::Marked),
            _ => None,
        }
    }
}

/// Follow-up flag of a message.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Flag {
    pub request: Option<String>,
    pub status: Option<FlagStatus>,
}

impl Flag {
    pub(crate) fn read(bag: &PropertyBag, named: &NamedPropertyMap) -> Result<Self> {
        Ok(Self {
            request: named_string(bag, named, PropertySet::Common, tags::LID_FLAG_REQUEST)?,
            status: bag
                .int32(tags::PR_FLAG_STATUS)?
                .and_then(FlagStatus::from_property),
        })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.request.is_none() && self.status.is_none()
    }
}

fn named_string(
    bag: &PropertyBag,
    named: &NamedPropertyMap,
    set: PropertySet,
    lid: u32,
) -> Result<Option<String>> {
    match named.id_of_lid(lid, set) {
        Some(id) => bag.string(id),
        None => Ok(None),
    }
}

fn named_datetime(
    bag: &PropertyBag,
    named: &NamedPropertyMap,
    set: PropertySet,
    lid: u32,
) -> Result<Option<DateTime<Utc>>> {
    match named.id_of_lid(lid, set) {
        Some(id) => bag.datetime(id),
        None => Ok(None),
    }
}

fn named_boolean(
    bag: &PropertyBag,
    named: &NamedPropertyMap,
    set: PropertySet,
    lid: u32,
) -> Result<Option<bool>> {
    match named.id_of_lid(lid, set) {
        Some(id) => bag.boolean(id),
        None => Ok(None),
    }
}
