//! Collector for errors that lookups swallow instead of propagating.
//!
//! Every best-effort step hands its failures to a [`Diagnostics`] value that
//! is threaded through the pipeline by `&mut`. Depending on [`Mode`] they are
//! counted silently, printed as one-liners, or printed in full together with
//! the raw response that triggered them.

use std::panic::Location;

use console::style;

/// Identity of a raw lookup response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Source {
  Geo,
  IpRdap,
  DomainRdap,
}

impl Source {
  #[must_use]
  pub const fn label(self) -> &'static str {
    match self {
      Self::Geo => "geo",
      Self::IpRdap => "ip_rdap",
      Self::DomainRdap => "domain_rdap",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
  #[default]
  Off,
  Debug,
  Stacktraces,
}

impl Mode {
  #[must_use]
  pub const fn from_flags(debug: bool, stacktraces: bool) -> Self {
    if stacktraces {
      Self::Stacktraces
    } else if debug {
      Self::Debug
    } else {
      Self::Off
    }
  }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
  mode: Mode,
  count: usize,
  erroring: Vec<Source>,
  messages: Vec<String>,
}

impl Diagnostics {
  #[must_use]
  pub fn new(mode: Mode) -> Self {
    Self {
      mode,
      ..Self::default()
    }
  }

  #[must_use]
  pub const fn enabled(&self) -> bool {
    !matches!(self.mode, Mode::Off)
  }

  /// Number of errors suppressed so far.
  #[must_use]
  pub const fn count(&self) -> usize {
    self.count
  }

  /// Sources whose raw response caused at least one error, in first-seen
  /// order. Only tracked in stacktrace mode.
  #[must_use]
  pub fn erroring(&self) -> &[Source] {
    &self.erroring
  }

  /// Everything printed so far.
  #[must_use]
  pub fn messages(&self) -> &[String] {
    &self.messages
  }

  /// Records an error that the caller is about to swallow.
  ///
  /// The caller's source location is part of the printed line, so this is
  /// `#[track_caller]` and helpers that forward to it should be too.
  #[track_caller]
  pub fn suppressed<E>(&mut self, label: &str, err: E, source: Option<Source>)
  where
    E: Into<anyhow::Error>,
  {
    let err = err.into();
    let at = Location::caller();
    self.count += 1;
    tracing::trace!(label, error = %err, "suppressed");

    if !self.enabled() {
      return;
    }

    let head = if label.is_empty() {
      format!("{}:{}: {err}", at.file(), at.line())
    } else {
      format!("{}:{}: {label}, {err}", at.file(), at.line())
    };
    self.emit(head);

    if self.mode == Mode::Stacktraces {
      self.emit(format!("{err:?}"));
      if let Some(src) = source {
        if !self.erroring.contains(&src) {
          self.erroring.push(src);
        }
      }
    }
  }

  /// Prints an informational line in debug mode.
  #[track_caller]
  pub fn note(&mut self, msg: impl AsRef<str>) {
    if self.enabled() {
      let at = Location::caller();
      self.emit(format!("{}:{}: {}", at.file(), at.line(), msg.as_ref()));
    }
  }

  fn emit(&mut self, line: String) {
    println!("{}", style(&line).dim());
    self.messages.push(line);
  }
}
