//! Console output for the `debate` binary.

use colored::Colorize;
use debate_core::{DebateError, DebateEvent, DebateOutcome, ROUNDS, Role, Transcript, Turn};

pub fn banner(topic: &str, personas: (&str, &str)) -> String {
    let rule = "=".repeat(60);
    format!(
        "\n{rule}\n{}\n{rule}\n{} {topic}\n{} {} vs {}\n",
        "Multi-Agent Debate".cyan().bold(),
        "Topic:".cyan().bold(),
        "Participants:".cyan().bold(),
        personas.0,
        personas.1,
    )
}

pub fn format_turn(turn: &Turn) -> String {
    let header = format!("[Round {}/{ROUNDS}] {}", turn.round, turn.speaker);
    let header = match turn.role {
        Role::A => header.yellow().bold(),
        Role::B => header.magenta().bold(),
    };
    format!("\n{header}\n{}\n", turn.text)
}

/// The live line for an event, if it is worth printing.
pub fn format_event(event: &DebateEvent) -> Option<String> {
    match event {
        DebateEvent::TurnRecorded(turn) => Some(format_turn(turn)),
        DebateEvent::RoundScored {
            round,
            score: Some(score),
        } => Some(format!(
            "{} coherence {:.1} | engagement {:.1} | strength {:.1}",
            format!("Round {round} scored:").dimmed(),
            score.coherence,
            score.engagement,
            score.argument_strength
        )),
        DebateEvent::RoundScored { round, score: None } => {
            Some(format!("Round {round} could not be scored").red().to_string())
        }
        DebateEvent::StateChanged(_) | DebateEvent::Finished(_) => None,
    }
}

/// Score table, aggregate, verdict and coherence notes.
pub fn format_summary(transcript: &Transcript) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", "Scores".cyan().bold()));
    out.push_str(&format!(
        "{:<7} {:>9} {:>10} {:>8}\n",
        "Round", "Coherence", "Engagement", "Strength"
    ));
    for (i, score) in transcript.scores.iter().enumerate() {
        match score {
            Some(s) => out.push_str(&format!(
                "{:<7} {:>9.2} {:>10.2} {:>8.2}\n",
                i + 1,
                s.coherence,
                s.engagement,
                s.argument_strength
            )),
            None => out.push_str(&format!("{:<7} {:>9}\n", i + 1, "n/a")),
        }
    }

    let summary = &transcript.summary;
    match &summary.aggregate {
        Some(agg) => out.push_str(&format!(
            "{:<7} {:>9.2} {:>10.2} {:>8.2}  ({}, {} of {} rounds)\n",
            "Overall",
            agg.coherence,
            agg.engagement,
            agg.argument_strength,
            summary.aggregator,
            summary.scored_rounds,
            transcript.rounds_completed
        )),
        None => out.push_str("No round could be scored.\n"),
    }

    if let Some(verdict) = &transcript.verdict {
        let line = match verdict.winner {
            Some(role) => format!(
                "Winner: {} (margin {:.2})",
                transcript.personas.get(role).name,
                verdict.margin
            )
            .green()
            .bold(),
            None => "No winner: the debate is tied".yellow().bold(),
        };
        out.push_str(&format!("\n{line}\n"));
        for role in [Role::A, Role::B] {
            let scores = verdict.for_role(role);
            out.push_str(&format!(
                "  {:<12} {:>9.2} {:>10.2} {:>8.2}  total {:.2}\n",
                transcript.personas.get(role).name,
                scores.coherence,
                scores.engagement,
                scores.argument_strength,
                scores.total()
            ));
        }
        out.push_str(&format!("  {}\n", verdict.justification));
    }

    if !transcript.notes.is_empty() {
        out.push_str(&format!("\n{}\n", "Coherence notes".cyan().bold()));
        for note in &transcript.notes {
            out.push_str(&format!("  Round {} {}: {}\n", note.round, note.role, note.issue));
        }
    }
    out
}

/// Final status line plus any persistence problem.
pub fn format_outcome(outcome: &DebateOutcome) -> String {
    let transcript = outcome.transcript();
    let mut out = match outcome.error() {
        None => format!(
            "\n{} {} rounds, {} turns\n",
            "Debate completed:".green().bold(),
            transcript.rounds_completed,
            transcript.turns.len()
        ),
        Some(error) => format!(
            "\n{} {error}\n{} turns recorded before the failure\n",
            "Debate aborted:".red().bold(),
            transcript.turns.len()
        ),
    };
    if let Some(DebateError::Sink { reason }) = outcome.sink_error() {
        out.push_str(&format!(
            "{} {reason}\n",
            "Transcript was not saved:".red().bold()
        ));
    }
    out
}
