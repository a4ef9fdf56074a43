use crate::cmd::DescribeArgs;
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_descriptor, OutputFormat};

pub fn run(args: DescribeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut link = args.link.open()?;
    let descriptor = link
        .describe()
        .map_err(|err| peer_error("description failed", err))?;
    print_descriptor(&descriptor, format);
    Ok(SUCCESS)
}
