//! Orthopedic specialist directory.
//!
//! Bundled data stands in for a referral backend; search, sorting, and
//! booking run entirely in memory.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: String,
    pub date: String,
    pub time: String,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specialist {
    pub id: String,
    pub name: String,
    pub specialization: String,
    pub rating: f64,
    pub review_count: u32,
    pub experience_years: u32,
    pub hospital: String,
    pub address: String,
    pub distance_miles: f64,
    pub phone: String,
    pub email: String,
    pub qualifications: Vec<String>,
    pub languages: Vec<String>,
    pub consultation_fee: u32,
    pub available_slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsultationType {
    InPerson,
    Video,
    Phone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub doctor_id: String,
    pub slot_id: String,
    pub consultation_type: ConsultationType,
    pub notes: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Rating,
    Distance,
    Experience,
    Fee,
}

#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub specialization: Option<String>,
    pub max_distance_miles: Option<f64>,
    pub min_rating: Option<f64>,
    pub sort_by: Option<SortBy>,
}

/// Great-circle distance in miles.
pub fn distance_miles(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_MILES: f64 = 3959.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_MILES * c
}

fn new_booking_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!("APT-{}-{}", Utc::now().timestamp_millis(), suffix)
}

pub struct SpecialistDirectory {
    specialists: Vec<Specialist>,
}

impl Default for SpecialistDirectory {
    fn default() -> Self {
        Self {
            specialists: bundled_specialists(),
        }
    }
}

impl SpecialistDirectory {
    pub fn with_specialists(specialists: Vec<Specialist>) -> Self {
        Self { specialists }
    }

    /// Filtered, optionally sorted view of the directory.
    pub fn search(&self, params: &SearchParams) -> Vec<Specialist> {
        let mut matches: Vec<Specialist> = self
            .specialists
            .iter()
            .filter(|doctor| {
                params
                    .min_rating
                    .map_or(true, |min| doctor.rating >= min)
            })
            .filter(|doctor| {
                params
                    .max_distance_miles
                    .map_or(true, |max| doctor.distance_miles <= max)
            })
            .filter(|doctor| {
                params.specialization.as_ref().map_or(true, |needle| {
                    doctor
                        .specialization
                        .to_lowercase()
                        .contains(&needle.to_lowercase())
                })
            })
            .cloned()
            .collect();

        if let Some(sort_by) = params.sort_by {
            match sort_by {
                SortBy::Rating => matches.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
                SortBy::Distance => {
                    matches.sort_by(|a, b| a.distance_miles.total_cmp(&b.distance_miles))
                }
                SortBy::Experience => {
                    matches.sort_by(|a, b| b.experience_years.cmp(&a.experience_years))
                }
                SortBy::Fee => matches.sort_by(|a, b| a.consultation_fee.cmp(&b.consultation_fee)),
            }
        }

        matches
    }

    pub fn get(&self, id: &str) -> Option<&Specialist> {
        self.specialists.iter().find(|doctor| doctor.id == id)
    }

    /// Book a slot with a specialist. The slot must exist and be open.
    pub fn book_appointment(
        &mut self,
        doctor_id: &str,
        slot_id: &str,
        consultation_type: ConsultationType,
        notes: impl Into<String>,
    ) -> Result<Booking> {
        let doctor = self
            .specialists
            .iter_mut()
            .find(|doctor| doctor.id == doctor_id)
            .ok_or_else(|| anyhow!("unknown specialist '{doctor_id}'"))?;

        let slot = doctor
            .available_slots
            .iter_mut()
            .find(|slot| slot.id == slot_id)
            .ok_or_else(|| anyhow!("unknown slot '{slot_id}'"))?;
        if !slot.available {
            bail!("slot '{slot_id}' is no longer available");
        }
        slot.available = false;

        Ok(Booking {
            id: new_booking_id(),
            doctor_id: doctor_id.to_string(),
            slot_id: slot_id.to_string(),
            consultation_type,
            notes: notes.into(),
            status: BookingStatus::Pending,
            created_at: Utc::now(),
        })
    }
}

fn slot(id: &str, date: &str, time: &str) -> TimeSlot {
    TimeSlot {
        id: id.into(),
        date: date.into(),
        time: time.into(),
        available: true,
    }
}

fn bundled_specialists() -> Vec<Specialist> {
    vec![
        Specialist {
            id: "1".into(),
            name: "Dr. Sarah Johnson".into(),
            specialization: "Orthopedic Trauma & Fracture Specialist".into(),
            rating: 4.9,
            review_count: 156,
            experience_years: 15,
            hospital: "City General Hospital".into(),
            address: "123 Medical Center Dr, Downtown".into(),
            distance_miles: 2.3,
            phone: "+1 (555) 123-4567".into(),
            email: "sarah.johnson@citygeneral.com".into(),
            qualifications: vec![
                "MD".into(),
                "FRCS".into(),
                "Fellowship in Trauma Surgery".into(),
            ],
            languages: vec!["English".into(), "Spanish".into()],
            consultation_fee: 250,
            available_slots: vec![
                slot("1", "2024-01-15", "09:00"),
                slot("2", "2024-01-15", "10:30"),
                slot("3", "2024-01-16", "14:00"),
            ],
        },
        Specialist {
            id: "2".into(),
            name: "Dr. Michael Chen".into(),
            specialization: "Hand & Wrist Surgery".into(),
            rating: 4.8,
            review_count: 203,
            experience_years: 12,
            hospital: "Metropolitan Medical Center".into(),
            address: "456 Health Plaza, Midtown".into(),
            distance_miles: 4.1,
            phone: "+1 (555) 234-5678".into(),
            email: "michael.chen@metromedical.com".into(),
            qualifications: vec![
                "MD".into(),
                "Fellowship in Hand Surgery".into(),
                "Board Certified".into(),
            ],
            languages: vec!["English".into(), "Mandarin".into()],
            consultation_fee: 300,
            available_slots: vec![
                slot("4", "2024-01-15", "11:00"),
                slot("5", "2024-01-17", "09:30"),
            ],
        },
        Specialist {
            id: "3".into(),
            name: "Dr. Emily Rodriguez".into(),
            specialization: "Sports Medicine & Orthopedics".into(),
            rating: 4.7,
            review_count: 89,
            experience_years: 8,
            hospital: "Sports Medicine Institute".into(),
            address: "789 Athletic Way, Sports District".into(),
            distance_miles: 6.8,
            phone: "+1 (555) 345-6789".into(),
            email: "emily.rodriguez@sportsmed.com".into(),
            qualifications: vec![
                "MD".into(),
                "Sports Medicine Fellowship".into(),
                "AOSSM Member".into(),
            ],
            languages: vec!["English".into(), "Spanish".into(), "Portuguese".into()],
            consultation_fee: 275,
            available_slots: vec![
                slot("6", "2024-01-16", "08:00"),
                slot("7", "2024-01-16", "15:30"),
            ],
        },
        Specialist {
            id: "4".into(),
            name: "Dr. Robert Thompson".into(),
            specialization: "Orthopedic Surgery & Joint Replacement".into(),
            rating: 4.6,
            review_count: 134,
            experience_years: 20,
            hospital: "University Medical Center".into(),
            address: "321 University Ave, Medical District".into(),
            distance_miles: 8.2,
            phone: "+1 (555) 456-7890".into(),
            email: "robert.thompson@umc.edu".into(),
            qualifications: vec![
                "MD".into(),
                "PhD".into(),
                "Fellowship in Joint Replacement".into(),
            ],
            languages: vec!["English".into()],
            consultation_fee: 320,
            available_slots: vec![
                slot("8", "2024-01-17", "13:00"),
                slot("9", "2024-01-18", "10:00"),
            ],
        },
        Specialist {
            id: "5".into(),
            name: "Dr. Amanda Foster".into(),
            specialization: "Pediatric Orthopedics".into(),
            rating: 4.8,
            review_count: 97,
            experience_years: 10,
            hospital: "Children's Medical Center".into(),
            address: "555 Kids Health Blvd, Family District".into(),
            distance_miles: 5.5,
            phone: "+1 (555) 567-8901".into(),
            email: "amanda.foster@childrenmed.com".into(),
            qualifications: vec![
                "MD".into(),
                "Pediatric Orthopedics Fellowship".into(),
                "Board Certified".into(),
            ],
            languages: vec!["English".into(), "French".into()],
            consultation_fee: 280,
            available_slots: vec![
                slot("10", "2024-01-16", "10:00"),
                slot("11", "2024-01-17", "14:30"),
            ],
        },
    ]
}
