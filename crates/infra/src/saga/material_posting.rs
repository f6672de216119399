//! Ledger postings driven by job-card events.
//!
//! `MaterialsIssued` deducts each frozen snapshot line; `JobAdjusted` posts
//! the negated consumable deltas of one correction. Keys are derived from the
//! job stream so a replay of that stream re-derives exactly the same postings:
//!
//! - issue:  `issue:<job_id>:<line>` (a job issues materials at most once)
//! - adjust: `adjust:<job_id>:<sequence_number>:<line>`

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tracing::warn;

use shopfloor_events::{EventEnvelope, Saga, SagaAction};
use shopfloor_inventory::{AdjustmentCause, Attribution, InventoryItemId};
use shopfloor_jobs::{JobAdjusted, JobCardEvent, MaterialsIssued};

use crate::aggregate_types;

/// One keyed stock movement on one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerPosting {
    pub key: String,
    pub item_id: InventoryItemId,
    pub delta: Decimal,
    pub attribution: Attribution,
    pub occurred_at: DateTime<Utc>,
}

impl SagaAction for LedgerPosting {
    fn idempotency_key(&self) -> &str {
        &self.key
    }
}

/// Turns committed material movements on job cards into ledger postings.
pub struct MaterialPostingSaga;

impl Saga for MaterialPostingSaga {
    type Action = LedgerPosting;

    fn saga_type() -> &'static str {
        "saga.material_posting"
    }

    fn source_types() -> &'static [&'static str] {
        &[aggregate_types::JOB_CARD]
    }

    fn react(incoming: &EventEnvelope<JsonValue>) -> Vec<LedgerPosting> {
        let event: JobCardEvent = match serde_json::from_value(incoming.payload().clone()) {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    saga = Self::saga_type(),
                    event_id = %incoming.event_id(),
                    event_type = incoming.event_type(),
                    error = %err,
                    "undecodable job card event"
                );
                return vec![];
            }
        };

        match event {
            JobCardEvent::MaterialsIssued(issued) => issue_postings(&issued),
            JobCardEvent::JobAdjusted(adjusted) => adjustment_postings(&adjusted, incoming.sequence_number()),
            _ => vec![],
        }
    }
}

fn issue_postings(issued: &MaterialsIssued) -> Vec<LedgerPosting> {
    issued
        .lines
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.quantity.is_zero())
        .map(|(idx, line)| LedgerPosting {
            key: format!("issue:{}:{idx}", issued.job_id),
            item_id: line.item_id,
            delta: -line.quantity,
            attribution: Attribution::new(
                issued.issued_by,
                AdjustmentCause::JobConsumption {
                    job: issued.job_id.0,
                    job_number: issued.job_number.clone(),
                },
            ),
            occurred_at: issued.occurred_at,
        })
        .collect()
}

fn adjustment_postings(adjusted: &JobAdjusted, sequence_number: u64) -> Vec<LedgerPosting> {
    let adjustment = &adjusted.adjustment;
    adjustment
        .consumable_deltas
        .iter()
        .enumerate()
        .filter(|(_, delta)| !delta.quantity_delta.is_zero())
        .map(|(idx, delta)| LedgerPosting {
            key: format!("adjust:{}:{sequence_number}:{idx}", adjusted.job_id),
            item_id: delta.item_id,
            delta: -delta.quantity_delta,
            attribution: Attribution::new(
                adjustment.actor,
                AdjustmentCause::JobAdjustment {
                    job: adjusted.job_id.0,
                    job_number: adjusted.job_number.clone(),
                },
            )
            .with_note(adjustment.reason.trim()),
            occurred_at: adjustment.at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use shopfloor_core::{AggregateId, EmployeeId};
    use shopfloor_events::Event;
    use shopfloor_jobs::{ConsumableDelta, IssuedMaterial, JobAdjustment, JobCardId, PrioritySet};

    fn envelope(job_id: JobCardId, seq: u64, event: &JobCardEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            job_id.0,
            aggregate_types::JOB_CARD,
            event.event_type(),
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    fn item() -> InventoryItemId {
        InventoryItemId::new(AggregateId::new())
    }

    #[test]
    fn issued_lines_become_keyed_deductions() {
        let job_id = JobCardId::new(AggregateId::new());
        let (resin, cloth) = (item(), item());
        let event = JobCardEvent::MaterialsIssued(MaterialsIssued {
            job_id,
            job_number: "JC-20260302-0001".to_string(),
            issued_by: EmployeeId::new(),
            lines: vec![
                IssuedMaterial { item_id: resin, quantity: dec!(3) },
                IssuedMaterial { item_id: cloth, quantity: dec!(0) },
                IssuedMaterial { item_id: cloth, quantity: dec!(0.25) },
            ],
            occurred_at: Utc::now(),
        });

        let postings = MaterialPostingSaga::react(&envelope(job_id, 4, &event));
        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].key, format!("issue:{job_id}:0"));
        assert_eq!(postings[0].delta, dec!(-3));
        // Zero lines are skipped but keep their index.
        assert_eq!(postings[1].key, format!("issue:{job_id}:2"));
        assert_eq!(postings[1].item_id, cloth);
        assert!(matches!(
            postings[1].attribution.cause,
            AdjustmentCause::JobConsumption { .. }
        ));
    }

    #[test]
    fn adjustment_keys_include_the_stream_position() {
        let job_id = JobCardId::new(AggregateId::new());
        let resin = item();
        let event = JobCardEvent::JobAdjusted(JobAdjusted {
            job_id,
            job_number: "JC-20260302-0001".to_string(),
            adjustment: JobAdjustment {
                time_delta_minutes: 0,
                consumable_deltas: vec![ConsumableDelta {
                    item_id: resin,
                    quantity_delta: dec!(1),
                    cost_delta: dec!(2.50),
                }],
                reason: " extra coat ".to_string(),
                actor: EmployeeId::new(),
                at: Utc::now(),
            },
            material_cost: dec!(10),
            labor_cost: dec!(0),
        });

        let first = MaterialPostingSaga::react(&envelope(job_id, 7, &event));
        let second = MaterialPostingSaga::react(&envelope(job_id, 9, &event));
        assert_eq!(first[0].key, format!("adjust:{job_id}:7:0"));
        assert_eq!(first[0].delta, dec!(-1));
        assert_eq!(first[0].attribution.note.as_deref(), Some("extra coat"));
        // Two identical corrections are still two postings.
        assert_ne!(first[0].key, second[0].key);
    }

    #[test]
    fn other_job_events_post_nothing() {
        let job_id = JobCardId::new(AggregateId::new());
        let event = JobCardEvent::PrioritySet(PrioritySet {
            job_id,
            priority: Some(1),
            occurred_at: Utc::now(),
        });
        assert!(MaterialPostingSaga::react(&envelope(job_id, 2, &event)).is_empty());
    }
}
