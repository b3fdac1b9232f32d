//! Card study session - question/answer faces and grading.
//!
//! A session starts on the question face. The "show answer" button flips it
//! to the answer face. One of the four grade buttons then ends the session,
//! and that is the only point where the [`Scheduler`] is called.
//!
//! ```text
//! Question ──button-r──► Answer ──button-{l,cl,cr,r}──► done (Schedule once)
//! ```
//!
//! On the question face an empty submit (the frame's "enter" key) also
//! shows the answer. If the frame reported a wrong typed answer, only the
//! "Incorrect" grade stays enabled on the answer face.
//!
//! The scheduling formula lives behind the [`Scheduler`] trait.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant, SystemTime};

use crate::error::{BusError, Result};
use crate::message::CardId;

/// The visible side of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Face {
    Question,
    Answer,
}

impl TryFrom<u8> for Face {
    type Error = BusError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Face::Question),
            1 => Ok(Face::Answer),
            other => Err(BusError::InvalidInput(format!("unexpected face {other}"))),
        }
    }
}

/// One of the four buttons under a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Button {
    Left,
    CenterLeft,
    CenterRight,
    Right,
}

impl Button {
    /// Name used in action messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Button::Left => "button-l",
            Button::CenterLeft => "button-cl",
            Button::CenterRight => "button-cr",
            Button::Right => "button-r",
        }
    }

    /// Answer quality this button stands for on the answer face.
    pub fn quality(self) -> AnswerQuality {
        match self {
            Button::Left => AnswerQuality::Blackout,
            Button::CenterLeft => AnswerQuality::CorrectDifficult,
            Button::CenterRight => AnswerQuality::Correct,
            Button::Right => AnswerQuality::Perfect,
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Button {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "button-l" => Ok(Button::Left),
            "button-cl" => Ok(Button::CenterLeft),
            "button-cr" => Ok(Button::CenterRight),
            "button-r" => Ok(Button::Right),
            other => Err(BusError::InvalidInput(format!("unknown button {other}"))),
        }
    }
}

/// How well an answer was recalled, worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnswerQuality {
    Blackout = 0,
    IncorrectRemembered = 1,
    IncorrectEasy = 2,
    CorrectDifficult = 3,
    Correct = 4,
    Perfect = 5,
}

impl AnswerQuality {
    /// True for qualities that count as forgetting the card.
    pub fn is_lapse(self) -> bool {
        self <= AnswerQuality::IncorrectEasy
    }
}

/// Label and state of a button on a face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonState {
    /// Label shown on the button.
    pub name: &'static str,
    /// Disabled buttons are shown but cannot be pressed.
    pub enabled: bool,
}

/// Buttons shown on a face.
pub type ButtonMap = BTreeMap<Button, ButtonState>;

/// Buttons available on a face.
pub fn buttons(face: Face) -> ButtonMap {
    buttons_for(face, false)
}

/// Buttons for a face, given whether a typed answer was wrong.
///
/// After a wrong typed answer every grade except "Incorrect" is disabled.
pub fn buttons_for(face: Face, answered_wrong: bool) -> ButtonMap {
    let labels: &[(Button, &'static str)] = match face {
        Face::Question => &[(Button::Right, "Show Answer")],
        Face::Answer => &[
            (Button::Left, "Incorrect"),
            (Button::CenterLeft, "Difficult"),
            (Button::CenterRight, "Correct"),
            (Button::Right, "Easy"),
        ],
    };
    labels
        .iter()
        .map(|&(button, name)| {
            let enabled = !(answered_wrong && face == Face::Answer && button != Button::Left);
            (button, ButtonState { name, enabled })
        })
        .collect()
}

/// A card with the schedule fields the scheduler maintains.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    /// Card identity.
    pub id: CardId,
    /// Next review time; `None` for a new card.
    pub due: Option<SystemTime>,
    /// Current spacing between reviews.
    pub interval: Duration,
    /// Ease multiplier applied to the interval; 0 until first scheduled.
    pub ease_factor: f32,
    /// Number of graded reviews so far.
    pub review_count: u32,
    /// Time of the last graded review.
    pub last_review: Option<SystemTime>,
}

/// The frame's verdict on one typed answer field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedAnswer {
    /// Rendered comparison of the typed text with the expected text.
    pub text: String,
    /// Whether the typed text matched.
    pub correct: bool,
}

impl Card {
    /// A new, never reviewed card.
    pub fn new(id: impl Into<CardId>) -> Self {
        Self {
            id: id.into(),
            due: None,
            interval: Duration::ZERO,
            ease_factor: 0.0,
            review_count: 0,
            last_review: None,
        }
    }
}

/// Computes a card's next review from a graded answer.
pub trait Scheduler {
    /// Update the card's schedule fields in place.
    fn schedule(&self, card: &mut Card, elapsed: Duration, quality: AnswerQuality) -> Result<()>;
}

/// What an action did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The session moved to another face.
    Flipped(Face),
    /// The card was graded and scheduled; the session is over.
    Done(AnswerQuality),
}

/// One pass through a card: question, answer, grade.
#[derive(Debug)]
pub struct CardSession {
    card: Card,
    face: Face,
    shown_at: Instant,
    typed_answers: BTreeMap<String, TypedAnswer>,
    done: bool,
}

impl CardSession {
    /// Start on the question face.
    pub fn new(card: Card) -> Self {
        Self {
            card,
            face: Face::Question,
            shown_at: Instant::now(),
            typed_answers: BTreeMap::new(),
            done: false,
        }
    }

    /// Resume a session on a face given by its numeric value.
    pub fn with_face(card: Card, face: u8) -> Result<Self> {
        Ok(Self {
            face: Face::try_from(face)?,
            ..Self::new(card)
        })
    }

    /// Current face.
    pub fn face(&self) -> Face {
        self.face
    }

    /// The card being studied.
    pub fn card(&self) -> &Card {
        &self.card
    }

    /// Take the card back, e.g. to persist its new schedule.
    pub fn into_card(self) -> Card {
        self.card
    }

    /// True once the card has been graded.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Buttons for the current face.
    pub fn buttons(&self) -> ButtonMap {
        buttons_for(self.face, self.answered_wrong())
    }

    /// Record a typed answer for a field while the question is showing.
    pub fn record_typed_answer(
        &mut self,
        field: impl Into<String>,
        answer: TypedAnswer,
    ) -> Result<()> {
        if self.done || self.face != Face::Question {
            return Err(BusError::InvalidInput(format!(
                "typed answers are only accepted on the question face of card {}",
                self.card.id
            )));
        }
        self.typed_answers.insert(field.into(), answer);
        Ok(())
    }

    /// Typed answers recorded for this pass.
    pub fn typed_answers(&self) -> &BTreeMap<String, TypedAnswer> {
        &self.typed_answers
    }

    /// True if any recorded typed answer was wrong.
    pub fn answered_wrong(&self) -> bool {
        self.typed_answers.values().any(|a| !a.correct)
    }

    /// Apply a button press by its wire name.
    ///
    /// An empty name on the question face shows the answer, as pressing
    /// enter in a text field does.
    pub fn press<S>(&mut self, button: &str, scheduler: &S) -> Result<Outcome>
    where
        S: Scheduler + ?Sized,
    {
        if button.is_empty() && self.face == Face::Question {
            return self.action(Button::Right, scheduler);
        }
        self.action(button.parse()?, scheduler)
    }

    /// Apply a button press.
    ///
    /// Fails with [`BusError::InvalidInput`] if the button is not on the
    /// current face or the session is over; nothing changes in that case.
    pub fn action<S>(&mut self, button: Button, scheduler: &S) -> Result<Outcome>
    where
        S: Scheduler + ?Sized,
    {
        if self.done {
            return Err(BusError::InvalidInput(format!(
                "card {} already answered",
                self.card.id
            )));
        }
        match self.buttons().get(&button) {
            Some(state) if state.enabled => {}
            Some(_) => {
                return Err(BusError::InvalidInput(format!(
                    "button {button} is disabled on {:?} face",
                    self.face
                )));
            }
            None => {
                return Err(BusError::InvalidInput(format!(
                    "unexpected button press {button} on {:?} face",
                    self.face
                )));
            }
        }
        tracing::debug!("Button {} pressed on {:?} face", button, self.face);

        match self.face {
            Face::Question => {
                self.face = Face::Answer;
                self.shown_at = Instant::now();
                Ok(Outcome::Flipped(Face::Answer))
            }
            Face::Answer => {
                let quality = button.quality();
                let elapsed = self.shown_at.elapsed();
                tracing::debug!(
                    "Old schedule: interval {:?}, ease {}, reviews {}",
                    self.card.interval,
                    self.card.ease_factor,
                    self.card.review_count
                );
                scheduler.schedule(&mut self.card, elapsed, quality)?;
                tracing::debug!(
                    "New schedule: interval {:?}, ease {}, reviews {}",
                    self.card.interval,
                    self.card.ease_factor,
                    self.card.review_count
                );
                self.typed_answers.clear();
                self.done = true;
                Ok(Outcome::Done(quality))
            }
        }
    }
}
