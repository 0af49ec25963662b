// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    apple_mobileprovision::{reader::ProfileInfo, MobileProvisionError, ProvisioningProfile},
    clap::{Arg, ArgMatches, Command},
    log::{info, warn, LevelFilter},
    std::io::Write,
};

const INFO_ABOUT: &str = "\
Print information about a provisioning profile.

Given the path to a provisioning profile, this command will parse it and
print a YAML description of its content, the certificates embedded in it,
and its signers. Signatures are verified as part of printing signer info.
";

const EXTRACT_ABOUT: &str = "\
Extract data from a provisioning profile.

The --data argument controls which data to extract and how to print it.
Possible values are:

content
   The raw encapsulated content. This is usually an XML property list.
der
   The DER encoded profile, as re-serialized by this tool.
pem
   The profile encoded as PEM with a PKCS7 tag.
";

const VERIFY_ABOUT: &str = "\
Verify the signatures in a provisioning profile.

Every signer must reference a certificate embedded in the profile and its
signature must verify against the profile content. For profiles whose
content is not embedded, pass the content with --content.

This only verifies cryptographic integrity. The certificate chain is not
validated, so a profile passing this check is not necessarily trusted by
Apple operating systems.
";

const EMBED_ABOUT: &str = "\
Install a provisioning profile into an application bundle.

The profile is written to embedded.mobileprovision in the bundle directory,
replacing any existing profile.
";

fn command_info(args: &ArgMatches) -> Result<(), MobileProvisionError> {
    let path = args
        .value_of("path")
        .ok_or(MobileProvisionError::CliBadArgument)?;

    let profile = ProvisioningProfile::from_path(path)?;
    let info = ProfileInfo::try_from(&profile)?;

    serde_yaml::to_writer(std::io::stdout(), &info)?;

    Ok(())
}

fn command_extract(args: &ArgMatches) -> Result<(), MobileProvisionError> {
    let path = args
        .value_of("path")
        .ok_or(MobileProvisionError::CliBadArgument)?;
    let format = args
        .value_of("data")
        .ok_or(MobileProvisionError::CliBadArgument)?;

    let profile = ProvisioningProfile::from_path(path)?;

    match format {
        "content" => {
            std::io::stdout().write_all(profile.content()?)?;
        }
        "der" => {
            profile.write_to(&mut std::io::stdout())?;
        }
        "pem" => {
            print!(
                "{}",
                pem::encode(&pem::Pem::new("PKCS7", profile.encode()?))
            );
        }
        _ => return Err(MobileProvisionError::CliBadArgument),
    }

    Ok(())
}

fn command_verify(args: &ArgMatches) -> Result<(), MobileProvisionError> {
    let path = args
        .value_of("path")
        .ok_or(MobileProvisionError::CliBadArgument)?;

    let profile = ProvisioningProfile::from_path(path)?;

    if let Some(content_path) = args.value_of("content") {
        let content = std::fs::read(content_path)?;
        profile.verify_signatures_with_content(&content)?;
    } else {
        profile.verify_signatures()?;
    }

    info!("{} signature(s) verified", profile.signers().count());
    warn!("certificate chain was not validated");

    Ok(())
}

fn command_embed(args: &ArgMatches) -> Result<(), MobileProvisionError> {
    let path = args
        .value_of("path")
        .ok_or(MobileProvisionError::CliBadArgument)?;
    let bundle = args
        .value_of("bundle")
        .ok_or(MobileProvisionError::CliBadArgument)?;

    let profile = ProvisioningProfile::from_path(path)?;
    profile.write_embedded(bundle)?;

    Ok(())
}

fn main_impl() -> Result<(), MobileProvisionError> {
    let app = Command::new("Apple provisioning profile tool")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Gregory Szorc <gregory.szorc@gmail.com>")
        .about("Inspect, verify, and install Apple provisioning profiles")
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .multiple_occurrences(true)
                .help("Increase logging verbosity. Can be specified multiple times."),
        );

    let app = app.subcommand(
        Command::new("info")
            .about("Print information about a provisioning profile")
            .long_about(INFO_ABOUT)
            .arg(
                Arg::new("path")
                    .required(true)
                    .help("Path of provisioning profile to examine"),
            ),
    );

    let app = app.subcommand(
        Command::new("extract")
            .about("Extract data from a provisioning profile")
            .long_about(EXTRACT_ABOUT)
            .arg(
                Arg::new("path")
                    .required(true)
                    .help("Path of provisioning profile to examine"),
            )
            .arg(
                Arg::new("data")
                    .long("data")
                    .takes_value(true)
                    .possible_values(["content", "der", "pem"])
                    .default_value("content")
                    .help("Which data to extract and how to format it"),
            ),
    );

    let app = app.subcommand(
        Command::new("verify")
            .about("Verify the signatures in a provisioning profile")
            .long_about(VERIFY_ABOUT)
            .arg(
                Arg::new("path")
                    .required(true)
                    .help("Path of provisioning profile to verify"),
            )
            .arg(
                Arg::new("content")
                    .long("content")
                    .takes_value(true)
                    .help("Path of signed content for profiles not embedding it"),
            ),
    );

    let app = app.subcommand(
        Command::new("embed")
            .about("Install a provisioning profile into an application bundle")
            .long_about(EMBED_ABOUT)
            .arg(
                Arg::new("path")
                    .required(true)
                    .help("Path of provisioning profile to install"),
            )
            .arg(
                Arg::new("bundle")
                    .required(true)
                    .help("Path of the application bundle directory"),
            ),
    );

    let matches = app.get_matches();

    let log_level = match matches.occurrences_of("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();

    match matches.subcommand() {
        Some(("embed", args)) => command_embed(args),
        Some(("extract", args)) => command_extract(args),
        Some(("info", args)) => command_info(args),
        Some(("verify", args)) => command_verify(args),
        _ => Err(MobileProvisionError::CliUnknownCommand),
    }
}

fn main() {
    let exit_code = match main_impl() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {}", err);
            1
        }
    };

    std::process::exit(exit_code)
}
