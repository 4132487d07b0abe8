//! RFC 2833 DTMF burst protocol, modeled as an explicit plan rather than an inline
//! async function so the burst's shape is testable without a real timer.

use crate::constants::{DEFAULT_AUDIO_CLOCK_RATE, DTMF_DUPLICATE_COUNT, RTP_EVENT_DEFAULT_SAMPLE_PERIOD_MS};

/// What the caller wants to send: a single telephony event and its total duration in
/// RTP clock-rate units.
#[derive(Debug, Clone, Copy)]
pub struct DtmfEventRequest {
    pub event_id: u8,
    pub volume: u8,
    pub total_duration: u16,
    pub clock_rate: u32,
}

impl Default for DtmfEventRequest {
    fn default() -> Self {
        DtmfEventRequest {
            event_id: 0,
            volume: 0,
            total_duration: 0,
            clock_rate: DEFAULT_AUDIO_CLOCK_RATE,
        }
    }
}

/// A single outbound telephony-event packet, fully described.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtmfPacketPlan {
    pub event_id: u8,
    pub volume: u8,
    pub duration: u16,
    pub end_of_event: bool,
    pub marker: bool,
}

impl DtmfPacketPlan {
    /// Encode the RFC 2833 four-byte telephony-event payload.
    pub fn encode(&self) -> [u8; 4] {
        let mut flags = self.volume & 0x3F;
        if self.end_of_event {
            flags |= 0x80;
        }
        let duration = self.duration.to_be_bytes();
        [self.event_id, flags, duration[0], duration[1]]
    }
}

/// One entry of a DTMF burst plan: the packet to send, and whether a `sample_period`
/// wait follows it before the next entry.
pub type PlanStep = (DtmfPacketPlan, bool);

/// Build the full sequence of packets (and inter-packet waits) for one telephony
/// event. Pure and total-duration-driven: no timer is consulted here, only when a
/// driver actually paces the plan.
pub fn build_plan(request: DtmfEventRequest) -> Vec<PlanStep> {
    let step = step_duration(request.clock_rate);
    let mut plan = Vec::new();

    if request.total_duration <= step {
        for i in 0..DTMF_DUPLICATE_COUNT {
            plan.push((
                DtmfPacketPlan {
                    event_id: request.event_id,
                    volume: request.volume,
                    duration: request.total_duration,
                    end_of_event: true,
                    marker: i == 0,
                },
                false,
            ));
        }
        return plan;
    }

    for i in 0..DTMF_DUPLICATE_COUNT {
        let is_last_start = i == DTMF_DUPLICATE_COUNT - 1;
        plan.push((
            DtmfPacketPlan {
                event_id: request.event_id,
                volume: request.volume,
                duration: step,
                end_of_event: false,
                marker: i == 0,
            },
            is_last_start,
        ));
    }

    let mut duration = step;
    while duration + step < request.total_duration {
        duration += step;
        plan.push((
            DtmfPacketPlan {
                event_id: request.event_id,
                volume: request.volume,
                duration,
                end_of_event: false,
                marker: false,
            },
            true,
        ));
    }

    for _ in 0..DTMF_DUPLICATE_COUNT {
        plan.push((
            DtmfPacketPlan {
                event_id: request.event_id,
                volume: request.volume,
                duration: request.total_duration,
                end_of_event: true,
                marker: false,
            },
            false,
        ));
    }

    plan
}

/// `clock_rate * sample_period / 1000`, e.g. 400 for 8 kHz audio.
pub fn step_duration(clock_rate: u32) -> u16 {
    ((clock_rate as u64 * RTP_EVENT_DEFAULT_SAMPLE_PERIOD_MS) / 1000) as u16
}

/// Runs a built plan to completion, pacing packets with real waits and checking for
/// cancellation before each send and before each wait: on cancel the burst exits
/// without sending further packets.
#[cfg(feature = "tokio")]
pub async fn drive<F>(
    plan: Vec<PlanStep>,
    mut is_cancelled: impl FnMut() -> bool,
    mut send: F,
) -> bool
where
    F: FnMut(&DtmfPacketPlan),
{
    for (packet, wait_after) in plan {
        if is_cancelled() {
            return false;
        }

        send(&packet);

        if wait_after {
            if is_cancelled() {
                return false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(
                RTP_EVENT_DEFAULT_SAMPLE_PERIOD_MS,
            ))
            .await;
        }
    }

    true
}
