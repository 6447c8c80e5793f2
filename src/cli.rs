//! Command-line interface and REPL
//!
//! Typed commands are parsed into [`ReplCommand`] and executed against a
//! [`SyncHandle`]. The prompt itself runs on a blocking thread.

use anyhow::Result;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::protocol::{
    CcMapping, PluginCommand, ReverbParameters, SoundQuery, DEFAULT_NOTE_VELOCITY,
};
use crate::state::{midi_controllable_parameters, midi_mappings, samples, sound_parameter, Node};
use crate::sync::SyncHandle;

/// A parsed REPL line
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Sounds,
    Sound(String),
    Volatile { json: bool },
    Dump,
    Status,
    Help,
    Exit,
    /// Anything that maps directly onto a plugin command
    Send(PluginCommand),
    ReplaceAt { index: usize, query: SoundQuery },
    NextPreset,
    PreviousPreset,
    RootNote { sound_uuid: String, note: u8 },
}

const HELP: &[(&str, &str)] = &[
    ("sounds", "List sounds in display order"),
    ("sound <uuid>", "Show one sound with samples and mappings"),
    ("volatile [json]", "Show voices, meters and query status"),
    ("dump", "Print the full state as XML"),
    ("status", "Show connection status"),
    ("play|stop|remove <uuid>", "Play, stop or remove a sound"),
    ("set <uuid|*> <param> <value>", "Set a float parameter (* = all sounds)"),
    ("seti <uuid|*> <param> <value>", "Set an integer parameter"),
    ("query add|replace <text>", "Load sounds matching a query"),
    ("replace <n> <text>", "Replace sound number n with a query result"),
    ("preset load <i>|save <i> <name>|next|prev", "Preset management"),
    ("polyphony <n>", "Set the number of voices"),
    ("midi-channel <n>", "Set the MIDI input channel (0 = omni)"),
    ("note on|off <n>", "Send a note to the sampler"),
    ("root <uuid> <n>", "Set the root note of a sound's first sample"),
    ("layout contiguous|interleaved|all", "Re-apply the note layout"),
    ("reverb <room> <damp> <wet> <dry> <width> <freeze>", "Set reverb parameters"),
    ("map <uuid> <cc> <param> [min max]", "Add a MIDI CC mapping"),
    ("unmap <uuid> <mapping-uuid>", "Remove a MIDI CC mapping"),
    ("clear", "Remove all sounds"),
    ("exit", "Quit"),
];

/// Parse one REPL line
pub fn parse_command(line: &str) -> Result<ReplCommand, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&command, args)) = words.split_first() else {
        return Err("empty command".to_string());
    };

    let cmd = match (command, args) {
        ("sounds", []) => ReplCommand::Sounds,
        ("sound", [uuid]) => ReplCommand::Sound(uuid.to_string()),
        ("volatile", []) => ReplCommand::Volatile { json: false },
        ("volatile", ["json"]) => ReplCommand::Volatile { json: true },
        ("dump", []) => ReplCommand::Dump,
        ("status", []) => ReplCommand::Status,
        ("help" | "?", _) => ReplCommand::Help,
        ("exit" | "quit", _) => ReplCommand::Exit,
        ("play", [uuid]) => ReplCommand::Send(PluginCommand::PlaySound(uuid.to_string())),
        ("stop", [uuid]) => ReplCommand::Send(PluginCommand::StopSound(uuid.to_string())),
        ("remove", [uuid]) => ReplCommand::Send(PluginCommand::RemoveSound(uuid.to_string())),
        ("set", [uuid, param, value]) => {
            known_parameter(param)?;
            ReplCommand::Send(PluginCommand::SetSoundParameter {
                sound_uuid: target(uuid),
                parameter: param.to_string(),
                value: number(value)?,
            })
        },
        ("seti", [uuid, param, value]) => {
            known_parameter(param)?;
            ReplCommand::Send(PluginCommand::SetSoundParameterInt {
                sound_uuid: target(uuid),
                parameter: param.to_string(),
                value: number(value)?,
            })
        },
        ("query", ["add", text @ ..]) if !text.is_empty() => {
            ReplCommand::Send(PluginCommand::AddSoundsFromQuery(SoundQuery::new(text.join(" "))))
        },
        ("query", ["replace", text @ ..]) if !text.is_empty() => ReplCommand::Send(
            PluginCommand::ReplaceSoundsFromQuery(SoundQuery::new(text.join(" "))),
        ),
        ("replace", [index, text @ ..]) if !text.is_empty() => ReplCommand::ReplaceAt {
            index: number(index)?,
            query: SoundQuery::new(text.join(" ")),
        },
        ("preset", ["load", index]) => ReplCommand::Send(PluginCommand::LoadPreset(number(index)?)),
        ("preset", ["save", index, name @ ..]) if !name.is_empty() => {
            ReplCommand::Send(PluginCommand::SavePreset {
                name: name.join(" "),
                index: number(index)?,
            })
        },
        ("preset", ["next"]) => ReplCommand::NextPreset,
        ("preset", ["prev"]) => ReplCommand::PreviousPreset,
        ("polyphony", [voices]) => ReplCommand::Send(PluginCommand::SetPolyphony(number(voices)?)),
        ("midi-channel", [channel]) => {
            let channel: u8 = number(channel)?;
            if channel > 16 {
                return Err(format!("MIDI channel {} out of range (0-16)", channel));
            }
            ReplCommand::Send(PluginCommand::SetMidiInChannel(channel))
        },
        ("note", [direction, note]) => {
            let note = midi_byte(note)?;
            let (velocity, channel) = (DEFAULT_NOTE_VELOCITY, 0);
            match *direction {
                "on" => ReplCommand::Send(PluginCommand::NoteOn {
                    note,
                    velocity,
                    channel,
                }),
                "off" => ReplCommand::Send(PluginCommand::NoteOff {
                    note,
                    velocity,
                    channel,
                }),
                other => return Err(format!("expected 'on' or 'off', got '{}'", other)),
            }
        },
        ("root", [uuid, note]) => ReplCommand::RootNote {
            sound_uuid: uuid.to_string(),
            note: midi_byte(note)?,
        },
        ("layout", [layout]) => ReplCommand::Send(PluginCommand::ReapplyLayout(layout.parse()?)),
        ("reverb", [room, damping, wet, dry, width, freeze]) => {
            ReplCommand::Send(PluginCommand::SetReverbParameters(ReverbParameters {
                room_size: number(room)?,
                damping: number(damping)?,
                wet_level: number(wet)?,
                dry_level: number(dry)?,
                width: number(width)?,
                freeze_mode: number(freeze)?,
            }))
        },
        ("map", [uuid, cc, param, range @ ..]) => {
            if !midi_controllable_parameters().any(|p| p == *param) {
                return Err(format!("'{}' cannot be MIDI mapped", param));
            }
            let (min_range, max_range) = match range {
                [] => (0.0, 1.0),
                [min, max] => (number(min)?, number(max)?),
                _ => return Err("expected both min and max".to_string()),
            };
            ReplCommand::Send(PluginCommand::AddOrUpdateCcMapping(CcMapping {
                sound_uuid: uuid.to_string(),
                mapping_uuid: String::new(),
                cc_number: midi_byte(cc)?,
                parameter_name: param.to_string(),
                min_range,
                max_range,
            }))
        },
        ("unmap", [uuid, mapping]) => ReplCommand::Send(PluginCommand::RemoveCcMapping {
            sound_uuid: uuid.to_string(),
            mapping_uuid: mapping.to_string(),
        }),
        ("clear", []) => ReplCommand::Send(PluginCommand::ClearAllSounds),
        _ => return Err(format!("unknown or incomplete command '{}' (try 'help')", line.trim())),
    };

    Ok(cmd)
}

/// `*` addresses every sound
fn target(uuid: &str) -> String {
    if uuid == "*" {
        String::new()
    } else {
        uuid.to_string()
    }
}

fn number<T: std::str::FromStr>(raw: &str) -> Result<T, String> {
    raw.parse()
        .map_err(|_| format!("invalid number '{}'", raw))
}

fn midi_byte(raw: &str) -> Result<u8, String> {
    let value: u8 = number(raw)?;
    if value > 127 {
        return Err(format!("{} out of MIDI range (0-127)", value));
    }
    Ok(value)
}

fn known_parameter(name: &str) -> Result<(), String> {
    sound_parameter(name)
        .map(|_| ())
        .ok_or_else(|| format!("unknown sound parameter '{}'", name))
}

/// Run the interactive prompt until `exit` or Ctrl-D
pub async fn run_repl(handle: SyncHandle) -> Result<()> {
    let runtime = tokio::runtime::Handle::current();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut rl = DefaultEditor::new()?;
        println!("{}", "Type 'help' for commands".dimmed());

        loop {
            match rl.readline("sampler> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line);

                    match parse_command(line) {
                        Ok(ReplCommand::Exit) => break,
                        Ok(cmd) => runtime.block_on(execute(&handle, cmd)),
                        Err(e) => println!("{}", e.red()),
                    }
                },
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    })
    .await?
}

async fn execute(handle: &SyncHandle, cmd: ReplCommand) {
    match cmd {
        ReplCommand::Sounds => print_sounds(&handle.sounds().await),
        ReplCommand::Sound(uuid) => match handle.sound(&uuid).await {
            Some(sound) => print_sound(&sound, handle.sound_index(&uuid).await),
            None => println!("{}", format!("No sound '{}'", uuid).yellow()),
        },
        ReplCommand::Volatile { json } => {
            let view = handle
                .read(|s| {
                    let snapshot = s.volatile_snapshot()?;
                    let indexes = s
                        .state()
                        .map(|doc| snapshot.voice_sound_indexes(doc))
                        .unwrap_or_default();
                    Some((snapshot, indexes))
                })
                .await
                .flatten();
            match view {
                Some((snapshot, _)) if json => match serde_json::to_string_pretty(&snapshot) {
                    Ok(text) => println!("{}", text),
                    Err(e) => println!("{}", format!("Failed to encode snapshot: {}", e).red()),
                },
                Some((snapshot, indexes)) => print_volatile(&snapshot, &indexes),
                None => println!("{}", "No volatile state yet".yellow()),
            }
        },
        ReplCommand::Dump => match handle.state_xml().await {
            Some(xml) => println!("{}", xml),
            None => println!("{}", "No full state yet".yellow()),
        },
        ReplCommand::Status => println!("Connection: {}", status_label(handle)),
        ReplCommand::Help => print_help(),
        ReplCommand::Exit => {},
        ReplCommand::Send(command) => {
            println!("{} {}", "→".green(), command.to_string().dimmed());
            handle.send(command);
        },
        ReplCommand::ReplaceAt { index, query } => handle.replace_sound_at(index, query),
        ReplCommand::NextPreset => handle.next_preset(),
        ReplCommand::PreviousPreset => handle.previous_preset(),
        ReplCommand::RootNote { sound_uuid, note } => handle.set_sound_root_note(&sound_uuid, note),
    }
}

fn status_label(handle: &SyncHandle) -> ColoredString {
    use crate::connection::ConnectionStatus;

    let status = handle.status();
    match status {
        ConnectionStatus::Connected => status.to_string().green(),
        ConnectionStatus::Disconnected => status.to_string().red(),
        ConnectionStatus::Reconnecting { .. } => status.to_string().yellow(),
    }
}

fn print_help() {
    println!("\n{}", "=== Commands ===".bold().cyan());
    for (usage, description) in HELP {
        println!("  {} {}", format!("{:<48}", usage).yellow(), description);
    }
    println!();
}

fn print_sounds(sounds: &[Node]) {
    if sounds.is_empty() {
        println!("{}", "No sounds loaded".yellow());
        return;
    }
    println!("\n{}", "=== Sounds ===".bold().cyan());
    for (i, sound) in sounds.iter().enumerate() {
        println!(
            "  {:>3}  {}  {}  ({} samples)",
            (i + 1).to_string().green(),
            sound.uuid().unwrap_or("-").dimmed(),
            sound.attr("name").unwrap_or(""),
            samples(sound).count()
        );
    }
    println!();
}

fn print_sound(sound: &Node, index: Option<usize>) {
    let label = index.map_or_else(|| "?".to_string(), |i| i.to_string());
    println!(
        "\n{} {}",
        format!("Sound #{}", label).bold().cyan(),
        sound.uuid().unwrap_or("-").dimmed()
    );
    for (name, value) in sound.attributes() {
        println!("  {:<24} {}", name, value);
    }
    for sample in samples(sound) {
        println!(
            "  {} {} {}",
            "sample".green(),
            sample.uuid().unwrap_or("-"),
            sample.attr("name").unwrap_or("")
        );
    }
    for mapping in midi_mappings(sound) {
        println!(
            "  {} {} cc={} → {}",
            "mapping".magenta(),
            mapping.uuid().unwrap_or("-"),
            mapping.attr("ccNumber").unwrap_or("?"),
            mapping.attr("parameterName").unwrap_or("?")
        );
    }
    println!();
}

fn print_volatile(snapshot: &crate::state::VolatileSnapshot, indexes: &[Option<usize>]) {
    println!("\n{}", "=== Volatile state ===".bold().cyan());
    println!("  querying       {}", snapshot.is_querying);
    println!("  midi received  {}", snapshot.midi_received);
    println!("  active voices  {}", snapshot.num_active_voices());
    let voices: Vec<String> = indexes
        .iter()
        .map(|i| i.map(|i| i.to_string()).unwrap_or_default())
        .collect();
    println!("  voice sounds   [{}]", voices.join(" "));
    let levels: Vec<String> = snapshot
        .audio_levels
        .iter()
        .map(|l| format!("{:.2}", l))
        .collect();
    println!("  audio levels   [{}]", levels.join(" "));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::NoteLayout;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command("sounds"), Ok(ReplCommand::Sounds));
        assert_eq!(
            parse_command("volatile json"),
            Ok(ReplCommand::Volatile { json: true })
        );
        assert_eq!(parse_command("  quit "), Ok(ReplCommand::Exit));
        assert_eq!(
            parse_command("play s1"),
            Ok(ReplCommand::Send(PluginCommand::PlaySound("s1".to_string())))
        );
        assert_eq!(
            parse_command("clear"),
            Ok(ReplCommand::Send(PluginCommand::ClearAllSounds))
        );
    }

    #[test]
    fn test_parse_parameters() {
        assert_eq!(
            parse_command("set * gain 0.8"),
            Ok(ReplCommand::Send(PluginCommand::SetSoundParameter {
                sound_uuid: String::new(),
                parameter: "gain".to_string(),
                value: 0.8,
            }))
        );
        assert!(parse_command("set s1 loudness 1").is_err());
        assert!(parse_command("seti s1 numSlices many").is_err());
    }

    #[test]
    fn test_parse_queries_and_presets() {
        assert_eq!(
            parse_command("replace 3 dog bark"),
            Ok(ReplCommand::ReplaceAt {
                index: 3,
                query: SoundQuery::new("dog bark"),
            })
        );
        assert_eq!(
            parse_command("preset save 2 My Kit"),
            Ok(ReplCommand::Send(PluginCommand::SavePreset {
                name: "My Kit".to_string(),
                index: 2,
            }))
        );
        assert_eq!(parse_command("preset prev"), Ok(ReplCommand::PreviousPreset));
        assert!(parse_command("query add").is_err());
    }

    #[test]
    fn test_parse_midi_commands() {
        assert_eq!(
            parse_command("note on 60"),
            Ok(ReplCommand::Send(PluginCommand::NoteOn {
                note: 60,
                velocity: 120,
                channel: 0,
            }))
        );
        assert!(parse_command("note on 200").is_err());
        assert!(parse_command("note up 60").is_err());
        assert!(parse_command("midi-channel 17").is_err());
        assert!(parse_command("map s1 74 attack").is_err());

        match parse_command("map s1 74 filterCutoff 0.2 0.9") {
            Ok(ReplCommand::Send(PluginCommand::AddOrUpdateCcMapping(mapping))) => {
                assert_eq!(mapping.cc_number, 74);
                assert_eq!(mapping.min_range, 0.2);
                assert_eq!(mapping.max_range, 0.9);
                assert!(mapping.mapping_uuid.is_empty());
            },
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_parse_layout() {
        assert_eq!(
            parse_command("layout interleaved"),
            Ok(ReplCommand::Send(PluginCommand::ReapplyLayout(
                NoteLayout::Interleaved
            )))
        );
        assert!(parse_command("layout spiral").is_err());
        assert!(parse_command("").is_err());
    }
}
