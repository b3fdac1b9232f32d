//! Study demo - one card frame talking to the host over the bus.
//!
//! This demo shows:
//! - Building a bus with the fetch handler and a custom `action` handler
//! - Registering a frame for a card
//! - Serving the card's stylesheet as a data URI
//! - Flipping and grading the card through button presses
//!
//! Run with `RUST_LOG=debug cargo run --example study` to see the bus logs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use framebus::codec::WireFormat;
use framebus::fetch::{Attachment, FetchHandler, MemoryStore, Note, Template, FETCH_MESSAGE_TYPE};
use framebus::study::{AnswerQuality, Card, CardSession, Outcome, Scheduler};
use framebus::{Bus, CardId, Inbound, Responder};

/// Doubles the interval on success, resets it on a lapse.
struct Doubling;

impl Scheduler for Doubling {
    fn schedule(
        &self,
        card: &mut Card,
        elapsed: Duration,
        quality: AnswerQuality,
    ) -> framebus::Result<()> {
        let day = Duration::from_secs(24 * 60 * 60);
        card.interval = if quality.is_lapse() {
            day
        } else {
            (card.interval * 2).max(day)
        };
        let now = SystemTime::now();
        card.last_review = Some(now);
        card.due = Some(now + card.interval);
        card.review_count += 1;
        tracing::info!(
            "Scheduled {} after {:?}: {:?}, next in {:?}",
            card.id,
            elapsed,
            quality,
            card.interval
        );
        Ok(())
    }
}

#[derive(Deserialize)]
struct Action {
    button: String,
}

type Sessions = Arc<Mutex<HashMap<CardId, CardSession>>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Arc::new(MemoryStore::new());
    store.insert_note("card-1", Note::new("note-1", "basic"));
    store.insert_template(Template::new("basic").with_attachment(
        "style.css",
        Attachment::new("text/css", ".card { font-size: 2em; }"),
    ));

    let sessions: Sessions = Arc::new(Mutex::new(HashMap::new()));
    sessions
        .lock()
        .insert("card-1".into(), CardSession::new(Card::new("card-1")));

    let handler_sessions = sessions.clone();
    let mut running = Bus::builder()
        .handler(FETCH_MESSAGE_TYPE, FetchHandler::new(store))
        .handle(
            "action",
            move |card: CardId, action: Action, responder: Responder| {
                let sessions = handler_sessions.clone();
                async move {
                    let outcome = {
                        let mut sessions = sessions.lock();
                        let session = sessions
                            .get_mut(&card)
                            .ok_or_else(|| framebus::BusError::NotFound(card.to_string()))?;
                        session.press(&action.button, &Doubling)?
                    };
                    match outcome {
                        Outcome::Flipped(face) => {
                            responder.respond("face", &json!({ "face": face as u8 })).await
                        }
                        Outcome::Done(quality) => {
                            responder.respond("graded", &json!({ "quality": quality as u8 })).await
                        }
                    }
                }
            },
        )
        .start()?;

    running.bus.register_frame("frame-1", "card-1")?;

    let frame_messages = [
        json!({"type": "fetch", "frameID": "frame-1", "payload": {"path": "style.css"}}),
        json!({"type": "action", "frameID": "frame-1", "payload": {"button": "button-r"}}),
        json!({"type": "action", "frameID": "frame-1", "payload": {"button": "button-cr"}}),
    ];

    for message in &frame_messages {
        let data = WireFormat::Json.encode(message)?;
        running.inbound.send(Inbound::new("frame-1", data)).await?;

        if let Some(out) = running.outbound.recv().await {
            let reply = out.decode(WireFormat::Json)?;
            println!("<- {} {}", reply.kind, reply.payload);
        }
    }

    running.bus.unregister_frame("frame-1")?;
    if let Some(session) = sessions.lock().remove(&CardId::from("card-1")) {
        let card = session.into_card();
        println!("card {} reviewed {} time(s)", card.id, card.review_count);
    }

    Ok(())
}
