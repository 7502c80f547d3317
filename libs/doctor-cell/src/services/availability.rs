use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::Serialize;
use tracing::{debug, warn};

use shared_config::PortalConfig;
use shared_gateway::ApiClient;
use shared_models::ApiError;

use crate::models::{AvailableSlotsResponse, Derivation, Slot, WorkingSchedule};
use crate::services::doctor::DoctorService;
use crate::time::{parse_hhmm, SLOT_MINUTES};

const SLOT_SECONDS: u32 = SLOT_MINUTES * 60;

/// Anything that can occupy a slot: booked appointments, or the taken
/// entries of a backend slot listing.
pub trait SlotOccupant {
    fn doctor_id(&self) -> &str;
    fn date(&self) -> NaiveDate;
    fn time(&self) -> Option<NaiveTime>;
    /// Cancelled bookings free their slot again.
    fn is_active(&self) -> bool;
}

/// A slot the backend reported as taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupiedSlot {
    pub doctor_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl SlotOccupant for OccupiedSlot {
    fn doctor_id(&self) -> &str {
        &self.doctor_id
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn time(&self) -> Option<NaiveTime> {
        Some(self.time)
    }

    fn is_active(&self) -> bool {
        true
    }
}

/// Weekday index as the backend numbers them: 0 = Sunday .. 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

pub struct AvailabilityDeriver;

impl AvailabilityDeriver {
    /// Derive the 15-minute slots of `schedule` on `date`, marking the ones
    /// held by an active booking of the same doctor on the same date.
    pub fn derive<B: SlotOccupant>(schedule: &WorkingSchedule, date: NaiveDate, bookings: &[B]) -> Derivation {
        let (raw_start, raw_end) = match (&schedule.hours_start, &schedule.hours_end) {
            (Some(start), Some(end)) if !start.trim().is_empty() && !end.trim().is_empty() => (start, end),
            _ => return Derivation::NoSchedule,
        };

        // An empty list is a schedule that closes every day.
        let Some(working_days) = &schedule.working_days else {
            return Derivation::NoSchedule;
        };

        let (start, end) = match (parse_hhmm(raw_start), parse_hhmm(raw_end)) {
            (Some(start), Some(end)) if start < end => (start, end),
            _ => {
                warn!(
                    "Doctor {} has invalid working hours {}-{}",
                    schedule.doctor_id, raw_start, raw_end
                );
                return Derivation::InvalidHours {
                    start: raw_start.clone(),
                    end: raw_end.clone(),
                };
            }
        };

        if !working_days.contains(&weekday_index(date)) {
            debug!("Doctor {} does not work on {}", schedule.doctor_id, date);
            return Derivation::DayClosed;
        }

        let taken: HashSet<NaiveTime> = bookings
            .iter()
            .filter(|b| b.is_active() && b.doctor_id() == schedule.doctor_id && b.date() == date)
            .filter_map(|b| b.time())
            .collect();

        let slots = quarter_hours(start, end)
            .map(|t| Slot::new(t, !taken.contains(&t)))
            .collect();

        Derivation::Open { slots }
    }

    /// Taken entries of a backend slot listing, usable as occupants.
    pub fn from_backend_slots(doctor_id: &str, date: NaiveDate, response: &AvailableSlotsResponse) -> Vec<OccupiedSlot> {
        response
            .slots
            .iter()
            .filter(|s| !s.available)
            .map(|s| OccupiedSlot {
                doctor_id: doctor_id.to_string(),
                date,
                time: s.time,
            })
            .collect()
    }
}

/// Quarter-hour boundaries t with start <= t < end; a ragged start rounds up.
fn quarter_hours(start: NaiveTime, end: NaiveTime) -> impl Iterator<Item = NaiveTime> {
    let start_secs = start.num_seconds_from_midnight();
    let first = start_secs.div_ceil(SLOT_SECONDS) * SLOT_SECONDS;
    let end_secs = end.num_seconds_from_midnight();

    (first..end_secs)
        .step_by(SLOT_SECONDS as usize)
        .filter_map(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, 0))
}

/// Derivation for one doctor and date, plus what the backend itself reported.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedAvailability {
    pub doctor_id: String,
    pub date: NaiveDate,
    pub derivation: Derivation,
    #[serde(skip)]
    pub occupied: Vec<OccupiedSlot>,
}

pub struct AvailabilityService {
    client: ApiClient,
    doctors: DoctorService,
}

impl AvailabilityService {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            client: ApiClient::new(config),
            doctors: DoctorService::new(config),
        }
    }

    pub async fn get_available_slots(
        &self,
        doctor_id: &str,
        date: NaiveDate,
    ) -> Result<AvailableSlotsResponse, ApiError> {
        let path = format!(
            "/appointments/available-slots/{}?date={}",
            urlencoding::encode(doctor_id),
            date.format("%Y-%m-%d")
        );
        self.client.get_data(&path, None).await
    }

    /// Fetch the backend's view of a day and re-derive it locally.
    ///
    /// When the slot listing carries no working hours the doctor's profile is
    /// fetched for them.
    pub async fn derive_for_date(&self, doctor_id: &str, date: NaiveDate) -> Result<DerivedAvailability, ApiError> {
        debug!("Deriving availability for doctor {} on {}", doctor_id, date);

        let response = self.get_available_slots(doctor_id, date).await?;
        let schedule = match response.schedule(doctor_id) {
            Some(schedule) => schedule,
            None => self.doctors.get_doctor(doctor_id).await?.schedule(),
        };

        let occupied = AvailabilityDeriver::from_backend_slots(doctor_id, date, &response);
        let derivation = AvailabilityDeriver::derive(&schedule, date, &occupied);
        log_disagreement(doctor_id, date, &derivation, &response);

        Ok(DerivedAvailability {
            doctor_id: doctor_id.to_string(),
            date,
            derivation,
            occupied,
        })
    }
}

fn log_disagreement(doctor_id: &str, date: NaiveDate, derivation: &Derivation, response: &AvailableSlotsResponse) {
    if response.slots.is_empty() {
        return;
    }

    let local: HashSet<NaiveTime> = derivation.slots().iter().filter(|s| s.available).map(|s| s.time).collect();
    let remote: HashSet<NaiveTime> = response.slots.iter().filter(|s| s.available).map(|s| s.time).collect();

    if local != remote {
        warn!(
            "Slot derivation for doctor {} on {} differs from backend ({} local vs {} remote available)",
            doctor_id,
            date,
            local.len(),
            remote.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Booking {
        doctor: &'static str,
        date: NaiveDate,
        time: &'static str,
        cancelled: bool,
    }

    impl SlotOccupant for Booking {
        fn doctor_id(&self) -> &str {
            self.doctor
        }
        fn date(&self) -> NaiveDate {
            self.date
        }
        fn time(&self) -> Option<NaiveTime> {
            parse_hhmm(self.time)
        }
        fn is_active(&self) -> bool {
            !self.cancelled
        }
    }

    fn schedule(start: &str, end: &str, days: &[u8]) -> WorkingSchedule {
        WorkingSchedule {
            doctor_id: "doc-1".to_string(),
            hours_start: Some(start.to_string()),
            hours_end: Some(end.to_string()),
            working_days: Some(days.to_vec()),
        }
    }

    fn t(raw: &str) -> NaiveTime {
        parse_hhmm(raw).unwrap()
    }

    // 2024-06-03 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    #[test]
    fn one_hour_window_yields_four_quarter_slots() {
        let derivation = AvailabilityDeriver::derive::<OccupiedSlot>(&schedule("09:00", "10:00", &[1]), monday(), &[]);
        let times: Vec<NaiveTime> = derivation.slots().iter().map(|s| s.time).collect();

        assert_eq!(times, vec![t("09:00"), t("09:15"), t("09:30"), t("09:45")]);
        assert!(derivation.slots().iter().all(|s| s.available));
    }

    #[test]
    fn active_bookings_occupy_exact_times_only() {
        let bookings = vec![
            Booking { doctor: "doc-1", date: monday(), time: "09:15", cancelled: false },
            Booking { doctor: "doc-1", date: monday(), time: "09:30", cancelled: true },
            Booking { doctor: "doc-2", date: monday(), time: "09:00", cancelled: false },
            Booking { doctor: "doc-1", date: monday().succ_opt().unwrap(), time: "09:45", cancelled: false },
        ];
        let derivation = AvailabilityDeriver::derive(&schedule("09:00", "10:00", &[1, 2]), monday(), &bookings);

        assert_eq!(
            derivation.slots(),
            &[
                Slot::new(t("09:00"), true),
                Slot::new(t("09:15"), false),
                Slot::new(t("09:30"), true),
                Slot::new(t("09:45"), true),
            ]
        );
    }

    #[test]
    fn closed_weekday_is_empty() {
        let derivation = AvailabilityDeriver::derive::<OccupiedSlot>(&schedule("09:00", "09:30", &[0, 2, 3]), monday(), &[]);

        assert_eq!(derivation, Derivation::DayClosed);
        assert!(derivation.slots().is_empty());
        assert_eq!(derivation.user_message().unwrap(), "The doctor is not available on this day.");
    }

    #[test]
    fn inverted_or_garbled_hours_signal_configuration_error() {
        let inverted = AvailabilityDeriver::derive::<OccupiedSlot>(&schedule("17:00", "09:00", &[1]), monday(), &[]);
        let equal = AvailabilityDeriver::derive::<OccupiedSlot>(&schedule("09:00", "09:00", &[1]), monday(), &[]);
        let garbled = AvailabilityDeriver::derive::<OccupiedSlot>(&schedule("nine", "10:00", &[1]), monday(), &[]);

        for derivation in [inverted, equal, garbled] {
            assert!(matches!(derivation, Derivation::InvalidHours { .. }));
            assert!(derivation.slots().is_empty());
        }
    }

    #[test]
    fn missing_hours_mean_no_schedule() {
        let mut missing = schedule("09:00", "10:00", &[1]);
        missing.hours_end = None;
        let derivation = AvailabilityDeriver::derive::<OccupiedSlot>(&missing, monday(), &[]);
        assert_eq!(derivation, Derivation::NoSchedule);

        let mut no_days = schedule("09:00", "10:00", &[]);
        no_days.working_days = None;
        assert_eq!(AvailabilityDeriver::derive::<OccupiedSlot>(&no_days, monday(), &[]), Derivation::NoSchedule);
    }

    #[test]
    fn empty_working_days_close_every_day() {
        let closed = AvailabilityDeriver::derive::<OccupiedSlot>(&schedule("09:00", "10:00", &[]), monday(), &[]);

        assert_eq!(closed, Derivation::DayClosed);
        assert!(closed.slots().is_empty());
        assert_eq!(closed.user_message().as_deref(), Some("The doctor is not available on this day."));
    }

    #[test]
    fn ragged_start_rounds_up_to_next_quarter() {
        let derivation = AvailabilityDeriver::derive::<OccupiedSlot>(&schedule("09:10", "10:00", &[1]), monday(), &[]);
        let times: Vec<NaiveTime> = derivation.slots().iter().map(|s| s.time).collect();
        assert_eq!(times, vec![t("09:15"), t("09:30"), t("09:45")]);
    }

    #[test]
    fn derivation_is_idempotent() {
        let bookings = vec![Booking { doctor: "doc-1", date: monday(), time: "09:00", cancelled: false }];
        let sched = schedule("08:30", "12:00", &[1]);

        let first = AvailabilityDeriver::derive(&sched, monday(), &bookings);
        let second = AvailabilityDeriver::derive(&sched, monday(), &bookings);
        assert_eq!(first, second);
    }

    #[test]
    fn backend_taken_entries_become_occupants() {
        let response = AvailableSlotsResponse {
            slots: vec![Slot::new(t("09:00"), false), Slot::new(t("09:15"), true)],
            working_hours: None,
            working_days: None,
        };
        let occupied = AvailabilityDeriver::from_backend_slots("doc-1", monday(), &response);

        assert_eq!(occupied.len(), 1);
        assert_eq!(occupied[0].time, t("09:00"));
    }

    #[test]
    fn sunday_is_index_zero() {
        let sunday = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        assert_eq!(weekday_index(sunday), 0);
        assert_eq!(weekday_index(monday()), 1);
    }
}
