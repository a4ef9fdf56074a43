use phead_frame::{parse_frame, parse_subcommand, Category, Command, Direction, Response};

use crate::cmd::{parse_hex, SendArgs};
use crate::exit::{frame_error, peer_error, CliError, CliResult, DEVICE_ERROR, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let command = resolve_command(&args)?;
    let mut link = args.link.open()?;

    let response = link
        .request(&command)
        .map_err(|err| peer_error("request failed", err))?;
    print_response(&command, &response, format);

    Ok(exit_code_for(&response))
}

fn resolve_command(args: &SendArgs) -> CliResult<Command> {
    if let Some(frame) = &args.frame {
        let bytes = parse_hex(frame)?;
        let frame = parse_frame(&bytes, Direction::Request)
            .map_err(|err| frame_error("invalid --frame", err))?;
        return Command::from_frame(&frame).map_err(|err| frame_error("invalid --frame", err));
    }

    let (Some(category), Some(subcommand)) = (&args.category, &args.subcommand) else {
        return Err(CliError::usage("category and subcommand are required"));
    };
    let category = Category::parse(category)
        .ok_or_else(|| CliError::usage(format!("unknown category '{category}'")))?;
    let subcommand = parse_subcommand(category, subcommand).ok_or_else(|| {
        CliError::usage(format!("unknown {category} subcommand '{subcommand}'"))
    })?;
    let command_args = match &args.args {
        Some(hex) => parse_hex(hex)?,
        None => Vec::new(),
    };
    Ok(Command::invoke(category, subcommand, &command_args))
}

/// An error response is still a successful exchange, but scripts need to see
/// it in the exit status.
fn exit_code_for(response: &Response) -> i32 {
    if response.is_ok() {
        SUCCESS
    } else {
        DEVICE_ERROR
    }
}
