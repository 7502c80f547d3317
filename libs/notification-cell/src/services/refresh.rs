use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::models::{PushEvent, Refresh};
use crate::services::hub::{Delivery, PushHub};

/// A view-level cache or registry that reacts to push traffic.
///
/// Refreshes are hints: a sink re-fetches or invalidates, it never patches
/// its state from the event payload. `on_event` exists for views that merge
/// idempotently by id (chat threads).
pub trait RefreshSink: Send + Sync {
    fn apply(&self, _refresh: &Refresh) {}

    fn on_event(&self, _event: &PushEvent) {}
}

/// Map one push event to the views that must refresh. Pure and idempotent.
pub fn refreshes_for(event: &PushEvent) -> Vec<Refresh> {
    match event {
        PushEvent::NewChatMessage(chat) => vec![
            Refresh::Conversation {
                user_id: chat.to.clone(),
                peer_id: chat.from.clone(),
            },
            Refresh::Conversation {
                user_id: chat.from.clone(),
                peer_id: chat.to.clone(),
            },
            Refresh::Notifications { user_id: chat.to.clone() },
        ],
        PushEvent::NewAppointment(appointment) | PushEvent::AppointmentUpdated(appointment) => {
            let mut refreshes = vec![
                Refresh::Appointments {
                    user_id: appointment.doctor_id.clone(),
                },
                Refresh::Appointments {
                    user_id: appointment.patient_id.clone(),
                },
            ];

            if let Some(doctor_id) = &appointment.doctor_id {
                refreshes.push(Refresh::Slots {
                    doctor_id: doctor_id.clone(),
                    date: appointment.date,
                });
            }

            // New bookings notify the doctor, updates notify the patient.
            let notified = match event {
                PushEvent::NewAppointment(_) => appointment.doctor_id.clone(),
                _ => appointment.patient_id.clone(),
            };
            refreshes.push(Refresh::Notifications { user_id: notified });

            refreshes.dedup();
            refreshes
        }
    }
}

/// Drive every sink from the hub until the hub closes.
pub fn spawn_refresh_loop(hub: &PushHub, sinks: Vec<Arc<dyn RefreshSink>>) -> JoinHandle<()> {
    let mut subscription = hub.subscribe();

    tokio::spawn(async move {
        info!("Refresh loop started with {} sinks", sinks.len());

        while let Some(delivery) = subscription.recv().await {
            let refreshes = match &delivery {
                Delivery::Event(event) => {
                    for sink in &sinks {
                        sink.on_event(event);
                    }
                    refreshes_for(event)
                }
                Delivery::Missed(_) => Refresh::resync(),
            };

            debug!("Applying {} refreshes", refreshes.len());
            for refresh in &refreshes {
                for sink in &sinks {
                    sink.apply(refresh);
                }
            }
        }

        info!("Refresh loop stopped");
    })
}
