// src/generator/pressure.rs
use crate::config::PressureConfig;
use crate::store::{DocumentStore, StoreError, Target};
use mongodb::bson::{doc, Document};
use rand::Rng;
use tracing::{debug, info};

const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// What one pressure round will do, drawn up front so the randomness is
/// separable from the store calls.
#[derive(Debug, Clone, PartialEq)]
pub enum PressureAction {
    /// Documents sharing one random field name and value, each tagged with a
    /// per-document random `even` flag.
    BulkInsert(Vec<Document>),
    /// Remove every document whose `even` flag matches the drawn value.
    BulkDelete(Document),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PressureDraw {
    pub action: PressureAction,
    /// Rare: drop the whole pressure collection this round.
    pub drop_collection: bool,
}

impl PressureDraw {
    pub fn draw(rng: &mut impl Rng, config: &PressureConfig) -> Self {
        let action = if rng.gen_bool(0.5) {
            let key = random_token(rng, config.token_len);
            let value = random_token(rng, config.token_len);
            let docs = (0..config.document_count)
                .map(|_| {
                    let mut doc = Document::new();
                    doc.insert(key.clone(), value.clone());
                    doc.insert("even", rng.gen_range(0..=1i32));
                    doc
                })
                .collect();
            PressureAction::BulkInsert(docs)
        } else {
            PressureAction::BulkDelete(doc! { "even": rng.gen_range(0..=1i32) })
        };

        Self {
            action,
            drop_collection: rng.gen_range(0..config.drop_odds) == 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PressureReport {
    pub action: &'static str,
    pub documents: u64,
    pub dropped_collection: bool,
}

/// Apply a drawn round against the pressure target.
pub async fn apply(
    store: &dyn DocumentStore,
    target: &Target,
    drawn: PressureDraw,
) -> Result<PressureReport, StoreError> {
    let (action, documents) = match drawn.action {
        PressureAction::BulkInsert(docs) => {
            let count = docs.len() as u64;
            debug!(%target, count, "pressure: bulk insert");
            store.insert_many(target, docs).await?;
            ("insert", count)
        }
        PressureAction::BulkDelete(filter) => {
            let deleted = store.delete_many(target, filter).await?;
            debug!(%target, deleted, "pressure: bulk delete");
            ("delete", deleted)
        }
    };

    if drawn.drop_collection {
        info!(%target, "pressure: dropping collection");
        store.drop_collection(target).await?;
    }

    Ok(PressureReport {
        action,
        documents,
        dropped_collection: drawn.drop_collection,
    })
}

fn random_token(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| TOKEN_CHARSET[rng.gen_range(0..TOKEN_CHARSET.len())] as char)
        .collect()
}
