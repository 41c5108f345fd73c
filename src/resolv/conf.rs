//! Resolver configuration.
//!
//! There are two parts to this module. [`ResolvConf`] reads the system’s
//! resolver configuration in the format of glibc’s `/etc/resolv.conf`.
//! [`ServerDiscovery`] is the interface through which the resolver worker
//! learns which server to send queries to if a request doesn’t name one.
//! The default, [`SystemDiscovery`], uses the first name server from the
//! system configuration.

use std::error;
use std::fmt;
use std::fs;
use std::io::{self, BufRead, Read};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::{FromStr, SplitWhitespace};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The path of the system resolver configuration.
pub const RESOLV_CONF_PATH: &str = "/etc/resolv.conf";

/// The port name servers listen on.
pub const DNS_PORT: u16 = 53;

//------------ ServerDiscovery -----------------------------------------------

/// A source for the default name server.
///
/// The resolver asks for the default server each time its worker starts.
/// Discovery is best effort: if no server can be found, only requests that
/// name their own server can succeed.
pub trait ServerDiscovery: fmt::Debug + Send + Sync {
    /// Returns the address of the default name server.
    fn default_server(&self) -> Option<SocketAddr>;
}

impl<T: ServerDiscovery + ?Sized> ServerDiscovery for Arc<T> {
    fn default_server(&self) -> Option<SocketAddr> {
        (**self).default_server()
    }
}

//------------ SystemDiscovery -----------------------------------------------

/// Discovers the default server from the system configuration.
///
/// On Unix systems, this is the first name server in `/etc/resolv.conf`.
/// Elsewhere, there is no default server.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemDiscovery;

impl ServerDiscovery for SystemDiscovery {
    #[cfg(unix)]
    fn default_server(&self) -> Option<SocketAddr> {
        ResolvConfFile::new(RESOLV_CONF_PATH).default_server()
    }

    #[cfg(not(unix))]
    fn default_server(&self) -> Option<SocketAddr> {
        None
    }
}

//------------ ResolvConfFile ------------------------------------------------

/// Discovers the default server from a resolv.conf-style file.
#[derive(Clone, Debug)]
pub struct ResolvConfFile(PathBuf);

impl ResolvConfFile {
    /// Creates a discovery reading the given file.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        ResolvConfFile(path.into())
    }

    /// Returns the path of the file.
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl ServerDiscovery for ResolvConfFile {
    fn default_server(&self) -> Option<SocketAddr> {
        let mut conf = ResolvConf::new();
        // A broken line stops parsing but whatever came before it counts.
        if let Err(err) = conf.parse_file(&self.0) {
            debug!(path = %self.0.display(), "reading resolv.conf: {}", err);
        }
        conf.servers.first().copied()
    }
}

//------------ StaticServer --------------------------------------------------

/// Always uses the same default server, or none at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticServer(pub Option<SocketAddr>);

impl ServerDiscovery for StaticServer {
    fn default_server(&self) -> Option<SocketAddr> {
        self.0
    }
}

//------------ ResolvConf ----------------------------------------------------

/// Resolver configuration.
///
/// The type can parse a glibc-style configuration file, commonly known as
/// `/etc/resolv.conf` through the [`parse`][Self::parse] and
/// [`parse_file`][Self::parse_file] methods.
///
/// The easiest way to get the system resolver configuration is through
/// [`ResolvConf::system`] or `ResolvConf::default()`. These parse the
/// configuration file and keep whatever was read before a failure.
#[derive(Clone, Debug)]
pub struct ResolvConf {
    /// Addresses of servers to query.
    pub servers: Vec<SocketAddr>,

    /// Timeout to wait for a response.
    pub timeout: Duration,

    /// Number of retries before giving up.
    pub attempts: usize,
}

/// # Management
///
impl ResolvConf {
    /// Creates a new, empty configuration.
    pub fn new() -> Self {
        ResolvConf {
            servers: Vec::new(),
            timeout: Duration::from_secs(5),
            attempts: 2,
        }
    }

    /// Returns the configuration of this system.
    ///
    /// This only reads a file on Unix-y systems.
    pub fn system() -> Self {
        let mut res = ResolvConf::new();
        if cfg!(unix) {
            if let Err(err) = res.parse_file(RESOLV_CONF_PATH) {
                debug!(path = RESOLV_CONF_PATH, "reading resolv.conf: {}", err);
            }
        }
        res
    }
}

/// # Parsing Configuration File
///
impl ResolvConf {
    /// Parses the configuration from a file.
    pub fn parse_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        let mut file = fs::File::open(path)?;
        self.parse(&mut file)
    }

    /// Parses the configuration from a reader.
    ///
    /// The format is that of the /etc/resolv.conf file. Unknown keywords
    /// and options are ignored.
    pub fn parse<R: Read>(&mut self, reader: &mut R) -> Result<(), Error> {
        for line in io::BufReader::new(reader).lines() {
            let line = line?;
            let line = line.trim_end();

            if line.is_empty()
                || line.starts_with(';')
                || line.starts_with('#')
            {
                continue;
            }

            let mut words = line.split_whitespace();
            let keyword = words.next();
            match keyword {
                Some("nameserver") => self.parse_nameserver(words)?,
                Some("options") => self.parse_options(words)?,
                // domain, search, sortlist, and vendor extensions
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_nameserver(
        &mut self,
        mut words: SplitWhitespace,
    ) -> Result<(), Error> {
        let word = next_word(&mut words)?;
        // Scoped IPv6 addresses need an interface index we don’t have.
        if !word.contains('%') {
            let addr = IpAddr::from_str(word).map_err(|_| Error::ParseError)?;
            self.servers.push(SocketAddr::new(addr, DNS_PORT));
        }
        no_more_words(words)
    }

    fn parse_options(&mut self, words: SplitWhitespace) -> Result<(), Error> {
        for word in words {
            match split_arg(word)? {
                ("timeout", Some(n)) => {
                    self.timeout = Duration::from_secs(n as u64)
                }
                ("attempts", Some(n)) => self.attempts = n,
                // Ignore unknown or misformated options.
                _ => {}
            }
        }
        Ok(())
    }
}

impl Default for ResolvConf {
    fn default() -> Self {
        Self::system()
    }
}

//--- Display

impl fmt::Display for ResolvConf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for server in &self.servers {
            if server.port() == DNS_PORT {
                writeln!(f, "nameserver {}", server.ip())?;
            } else {
                writeln!(f, "nameserver {}", server)?;
            }
        }

        // Collect options so we only print them if there are any non-default
        // ones.
        let mut options = Vec::new();
        if self.timeout != Duration::from_secs(5) {
            options.push(format!("timeout:{}", self.timeout.as_secs()));
        }
        if self.attempts != 2 {
            options.push(format!("attempts:{}", self.attempts));
        }
        if !options.is_empty() {
            f.write_str("options")?;
            for option in options {
                write!(f, " {}", option)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

//------------ Private Helpers -----------------------------------------------
//
// These are here to wrap stuff into Results.

/// Returns a reference to the next word or an error.
fn next_word<'a>(words: &mut SplitWhitespace<'a>) -> Result<&'a str, Error> {
    words.next().ok_or(Error::ParseError)
}

/// Returns nothing but errors out if there are words left.
fn no_more_words(mut words: SplitWhitespace) -> Result<(), Error> {
    match words.next() {
        Some(..) => Err(Error::ParseError),
        None => Ok(()),
    }
}

/// Splits the name and argument from an option with arguments.
///
/// These options consist of a name followed by a colon followed by a
/// value, which so far is only `usize`, so we do that.
fn split_arg(s: &str) -> Result<(&str, Option<usize>), Error> {
    match s.find(':') {
        Some(idx) => {
            let (left, right) = s.split_at(idx);
            Ok((left, Some(right[1..].parse()?)))
        }
        None => Ok((s, None)),
    }
}

//------------ Error ---------------------------------------------------------

/// The error that can happen when parsing `resolv.conf`.
#[derive(Clone, Debug)]
pub enum Error {
    /// The file is not a proper file.
    ParseError,

    /// Something happend while reading.
    Io(Arc<io::Error>),
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Error {
        Error::Io(Arc::new(error))
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(_: std::num::ParseIntError) -> Error {
        Error::ParseError
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError => f.write_str("error parsing configuration"),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::ParseError => None,
            Error::Io(err) => Some(err.as_ref()),
        }
    }
}

//============ Testing =======================================================
