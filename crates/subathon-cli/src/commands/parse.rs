use serde::Serialize;
use subathon_core::{format_clock, human_delta, parse_duration};

#[derive(Serialize)]
struct Parsed<'a> {
    input: &'a str,
    seconds: u64,
    clock: String,
    human: String,
}

pub fn run(input: &str) -> Result<(), Box<dyn std::error::Error>> {
    let seconds = parse_duration(input);
    let parsed = Parsed {
        input,
        seconds,
        clock: format_clock(seconds as f64),
        human: human_delta(seconds as f64),
    };
    println!("{}", serde_json::to_string_pretty(&parsed)?);
    Ok(())
}
