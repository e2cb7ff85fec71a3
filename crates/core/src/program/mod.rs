//! Instruction files: one oscillator declaration per line.
//!
//! ```text
//! # start, end, low, high, phase, hz, target, wave [, center_x, center_y]
//! 0, 40000, 0, 4095, 0, 200, x, sin
//! 0, 40000, 0, 4095, 0, 301, y, cos
//! 0, 40000, 1000, 4095, 0, 0.5, 0.h, sin
//! 0, 40000, 20, 20, 0, 0, g, sin
//! 0, 40000, 0, 6.283, 0, 0.25, o, sin, 2048, 2048
//! ```
//!
//! Targets are `x`, `y`, `r`, `g`, `b`, `o` (rotation, needs both centre
//! fields) or `<n>.<h|l|p>`, which modulates the high, low or phase field of
//! the `n`th earlier declaration (counting from zero).

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    oscillator::{Axis, ColorChannel, Field, OscillatorDescriptor, SlotId, Target, Waveform},
    LaserError, Result, Scheduler,
};

/// Target as written in the file, before declaration references are bound to
/// pool slots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TargetRef {
    Declaration { index: usize, field: Field },
    Position(Axis),
    Color(ColorChannel),
    Rotation { center_x: f32, center_y: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    /// One-based source line, for diagnostics.
    pub line: usize,
    pub start: u32,
    pub end: u32,
    pub low: f32,
    pub high: f32,
    pub phase: f32,
    pub frequency_hz: f32,
    pub target: TargetRef,
    pub waveform: Waveform,
}

impl Declaration {
    fn descriptor(&self, target: Target) -> OscillatorDescriptor {
        OscillatorDescriptor {
            start: self.start,
            end: self.end,
            low: self.low,
            high: self.high,
            phase: self.phase,
            frequency_hz: self.frequency_hz,
            target,
            waveform: self.waveform,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    declarations: Vec<Declaration>,
}

/// Outcome of loading a program into a scheduler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Slot per declaration, `None` where the declaration was dropped.
    pub slots: Vec<Option<SlotId>>,
}

impl LoadReport {
    pub fn loaded(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Indices of declarations that did not fit in the pool.
    pub fn dropped(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.is_none().then_some(index))
            .collect()
    }
}

impl Program {
    pub fn parse(text: &str) -> Result<Self> {
        let mut declarations = Vec::new();
        for (number, raw) in text.lines().enumerate() {
            let line = number + 1;
            let code = raw.split('#').next().unwrap_or_default();
            let compact: String = code.chars().filter(|ch| !ch.is_whitespace()).collect();
            if compact.is_empty() {
                continue;
            }
            let declaration = parse_declaration(&compact, line, declarations.len())?;
            declarations.push(declaration);
        }
        Ok(Self { declarations })
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Last tick any declaration is live for, i.e. how long the program runs.
    pub fn end_tick(&self) -> u32 {
        self.declarations.iter().map(|d| d.end).max().unwrap_or(0)
    }

    /// Allocates every declaration in order. Declarations that do not fit are
    /// dropped, and so is anything modulating a dropped declaration; other
    /// allocation failures abort the load.
    pub fn load_into(&self, scheduler: &mut Scheduler) -> Result<LoadReport> {
        let mut report = LoadReport::default();

        for declaration in &self.declarations {
            let target = match declaration.target {
                TargetRef::Declaration { index, field } => match report.slots.get(index) {
                    Some(Some(slot)) => Target::Attribute { slot: *slot, field },
                    None => {
                        return Err(LaserError::parse(
                            declaration.line,
                            format!("declaration {index} is not an earlier declaration"),
                        ))
                    }
                    Some(None) => {
                        warn!(
                            line = declaration.line,
                            index, "dropping modulator of a dropped declaration"
                        );
                        report.slots.push(None);
                        continue;
                    }
                },
                TargetRef::Position(axis) => Target::PositionChannel { axis },
                TargetRef::Color(channel) => Target::ColorChannel { channel },
                TargetRef::Rotation { center_x, center_y } => Target::Rotation { center_x, center_y },
            };

            match scheduler.schedule(&declaration.descriptor(target)) {
                Ok(slot) => report.slots.push(Some(slot)),
                Err(err) if err.is_recoverable() => report.slots.push(None),
                Err(LaserError::MalformedDescriptor(reason)) => {
                    return Err(LaserError::parse(declaration.line, reason))
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            loaded = report.loaded(),
            dropped = report.slots.len() - report.loaded(),
            "program loaded"
        );
        Ok(report)
    }
}

fn parse_declaration(compact: &str, line: usize, position: usize) -> Result<Declaration> {
    let fields: Vec<&str> = compact.split(',').collect();
    if fields.len() != 8 && fields.len() != 10 {
        return Err(LaserError::parse(
            line,
            format!("expected 8 or 10 comma-separated fields, found {}", fields.len()),
        ));
    }

    let target = match fields[6].to_ascii_lowercase().as_str() {
        "x" => TargetRef::Position(Axis::X),
        "y" => TargetRef::Position(Axis::Y),
        "r" => TargetRef::Color(ColorChannel::R),
        "g" => TargetRef::Color(ColorChannel::G),
        "b" => TargetRef::Color(ColorChannel::B),
        "o" => {
            if fields.len() != 10 {
                return Err(LaserError::parse(line, "rotation target needs center_x and center_y"));
            }
            TargetRef::Rotation {
                center_x: number(fields[8], "center_x", line)?,
                center_y: number(fields[9], "center_y", line)?,
            }
        }
        token => parse_reference(token, line, position)?,
    };

    Ok(Declaration {
        line,
        start: tick(fields[0], "start", line)?,
        end: tick(fields[1], "end", line)?,
        low: number(fields[2], "low", line)?,
        high: number(fields[3], "high", line)?,
        phase: number(fields[4], "phase", line)?,
        frequency_hz: number(fields[5], "frequency", line)?,
        target,
        waveform: waveform(fields[7], line)?,
    })
}

fn parse_reference(token: &str, line: usize, position: usize) -> Result<TargetRef> {
    let Some((index, field)) = token.split_once('.') else {
        return Err(LaserError::parse(line, format!("unknown target `{token}`")));
    };
    let index: usize = index
        .parse()
        .map_err(|_| LaserError::parse(line, format!("invalid declaration index in `{token}`")))?;
    let field = match field {
        "h" => Field::High,
        "l" => Field::Low,
        "p" => Field::Phase,
        other => {
            return Err(LaserError::parse(
                line,
                format!("unknown field `{other}`, expected h, l or p"),
            ))
        }
    };
    if index >= position {
        return Err(LaserError::parse(
            line,
            format!("`{token}` must refer to an earlier declaration"),
        ));
    }
    Ok(TargetRef::Declaration { index, field })
}

fn tick(text: &str, name: &str, line: usize) -> Result<u32> {
    text.parse()
        .map_err(|_| LaserError::parse(line, format!("{name} must be a tick count, got `{text}`")))
}

fn number(text: &str, name: &str, line: usize) -> Result<f32> {
    match text.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(LaserError::parse(line, format!("{name} must be a number, got `{text}`"))),
    }
}

fn waveform(text: &str, line: usize) -> Result<Waveform> {
    match text.to_ascii_lowercase().as_str() {
        "sin" | "sine" => Ok(Waveform::Sine),
        "cos" | "cosine" => Ok(Waveform::Cosine),
        other => Err(LaserError::parse(line, format!("unknown waveform `{other}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOW: &str = "\
# lissajous with a breathing x amplitude
0, 40000, 0, 4095, 0, 200, x, sin
0, 40000, 0, 4095, 0, 301, Y, cos   # trailing comment

0, 40000, 1000, 4095, 0, 0.5, 0.h, sin
0, 40000, 20, 20, 0, 0, g, sine
0, 40000, 0, 6.283, 0, 0.25, o, sin, 2048, 2048
";

    fn parse_err(text: &str) -> (usize, String) {
        match Program::parse(text).unwrap_err() {
            LaserError::Parse { line, message } => (line, message),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn parses_every_target_kind() {
        let program = Program::parse(SHOW).unwrap();
        assert_eq!(program.len(), 5);
        let targets: Vec<_> = program.declarations().iter().map(|d| d.target).collect();
        assert_eq!(
            targets,
            vec![
                TargetRef::Position(Axis::X),
                TargetRef::Position(Axis::Y),
                TargetRef::Declaration {
                    index: 0,
                    field: Field::High
                },
                TargetRef::Color(ColorChannel::G),
                TargetRef::Rotation {
                    center_x: 2048.0,
                    center_y: 2048.0
                },
            ]
        );
        assert_eq!(program.declarations()[1].waveform, Waveform::Cosine);
        assert_eq!(program.declarations()[2].line, 5);
        assert_eq!(program.end_tick(), 40_000);
    }

    #[test]
    fn whitespace_inside_fields_is_ignored() {
        let program = Program::parse("1 0, 2 0,0,1 0,0,1,x,s in").unwrap();
        let declaration = &program.declarations()[0];
        assert_eq!((declaration.start, declaration.end, declaration.high), (10, 20, 10.0));
    }

    #[test]
    fn reports_line_of_bad_number() {
        let (line, message) = parse_err("# header\n0,10,0,1,0,1,x,sin\n0,ten,0,1,0,1,x,sin\n");
        assert_eq!(line, 3);
        assert!(message.contains("end"));
    }

    #[test]
    fn rejects_wrong_field_count() {
        let (_, message) = parse_err("0,10,0,1,0,1,x");
        assert!(message.contains("found 7"));
    }

    #[test]
    fn rejects_forward_and_self_references() {
        let (_, message) = parse_err("0,10,0,1,0,1,0.h,sin");
        assert!(message.contains("earlier declaration"));
        let (line, _) = parse_err("0,10,0,1,0,1,x,sin\n0,10,0,1,0,1,3.p,sin");
        assert_eq!(line, 2);
    }

    #[test]
    fn rejects_unknown_tokens() {
        assert!(parse_err("0,10,0,1,0,1,z,sin").1.contains("unknown target"));
        assert!(parse_err("0,10,0,1,0,1,x,square").1.contains("unknown waveform"));
        assert!(parse_err("0,10,0,1,0,1,x,sin\n0,10,0,1,0,1,0.q,sin").1.contains("unknown field"));
        assert!(parse_err("0,10,0,1,0,1,o,sin").1.contains("center_x"));
    }

    #[test]
    fn loads_modulator_above_its_target() {
        let program = Program::parse(SHOW).unwrap();
        let mut scheduler = Scheduler::new(8);
        let report = program.load_into(&mut scheduler).unwrap();

        assert_eq!(report.loaded(), 5);
        let target = report.slots[0].unwrap();
        let modulator = report.slots[2].unwrap();
        assert!(modulator.index > target.index);
        assert_eq!(
            scheduler.pool().get(modulator).unwrap().target,
            Target::Attribute {
                slot: target,
                field: Field::High
            }
        );
    }

    #[test]
    fn drops_declarations_that_do_not_fit() {
        let text = "\
0,100,0,10,0,1,x,sin
0,100,0,10,0,1,y,sin
0,100,0,10,0,1,1.l,sin
0,100,0,10,0,1,2.p,sin
0,100,5,5,0,0,r,sin
";
        let program = Program::parse(text).unwrap();
        let mut scheduler = Scheduler::new(2);
        let report = program.load_into(&mut scheduler).unwrap();

        assert_eq!(report.loaded(), 2);
        assert_eq!(report.dropped(), vec![2, 3, 4]);
        assert_eq!(scheduler.pool().active_count(), 2);
    }

    #[test]
    fn rejects_forward_references_in_deserialised_programs() {
        let json = r#"{"declarations":[
            {"line":1,"start":0,"end":10,"low":0.0,"high":1.0,"phase":0.0,
             "frequency_hz":1.0,"target":{"Position":"x"},"waveform":"sine"},
            {"line":2,"start":0,"end":10,"low":0.0,"high":1.0,"phase":0.0,
             "frequency_hz":1.0,"target":{"Declaration":{"index":3,"field":"high"}},
             "waveform":"sine"}
        ]}"#;
        let program: Program = serde_json::from_str(json).unwrap();
        let mut scheduler = Scheduler::new(4);

        match program.load_into(&mut scheduler).unwrap_err() {
            LaserError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("declaration 3"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_self_references_in_deserialised_programs() {
        let json = r#"{"declarations":[
            {"line":7,"start":0,"end":10,"low":0.0,"high":1.0,"phase":0.0,
             "frequency_hz":1.0,"target":{"Declaration":{"index":0,"field":"low"}},
             "waveform":"cosine"}
        ]}"#;
        let program: Program = serde_json::from_str(json).unwrap();
        let err = program.load_into(&mut Scheduler::new(4)).unwrap_err();
        assert!(matches!(err, LaserError::Parse { line: 7, .. }));
    }
}
