//! Return codes reported by the engine through [`crate::engine::Status`].
//!
//! The table below is the single source of truth: every code maps to one
//! [`ReturnCode`] variant and a human readable message. Negative codes are
//! errors, `0` is success and `1` marks the end of data.

use std::fmt;

macro_rules! return_codes {
    ($(($variant:ident, $code:expr, $message:expr)),+ $(,)?) => {
        /// A native return code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ReturnCode {
            $($variant,)+
        }

        impl ReturnCode {
            /// Every known code, in table order.
            pub const ALL: &'static [ReturnCode] = &[$(ReturnCode::$variant,)+];

            /// The numeric value as reported by the engine.
            pub const fn code(self) -> i32 {
                match self {
                    $(ReturnCode::$variant => $code,)+
                }
            }

            pub const fn message(self) -> &'static str {
                match self {
                    $(ReturnCode::$variant => $message,)+
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(ReturnCode::$variant => stringify!($variant),)+
                }
            }

            /// Map a numeric code back to its variant.
            ///
            /// Codes outside the table are reported as [`ReturnCode::UnknownError`].
            pub fn from_code(code: i32) -> Self {
                match code {
                    $(c if c == $code => ReturnCode::$variant,)+
                    _ => ReturnCode::UnknownError,
                }
            }
        }
    };
}

return_codes! {
    (Success, 0, "success"),
    (EndOfData, 1, "end of data"),
    (UnknownError, -1, "unknown error"),
    (OperationNotPermitted, -2, "operation not permitted"),
    (NoSuchFileOrDirectory, -3, "no such file or directory"),
    (NoSuchProcess, -4, "no such process"),
    (InterruptedFunctionCall, -5, "interrupted function call"),
    (InputOutputError, -6, "input/output error"),
    (NoSuchDeviceOrAddress, -7, "no such device or address"),
    (ArgListTooLong, -8, "argument list too long"),
    (ExecFormatError, -9, "exec format error"),
    (BadFileDescriptor, -10, "bad file descriptor"),
    (NoChildProcesses, -11, "no child processes"),
    (ResourceTemporarilyUnavailable, -12, "resource temporarily unavailable"),
    (NotEnoughSpace, -13, "not enough space"),
    (PermissionDenied, -14, "permission denied"),
    (BadAddress, -15, "bad address"),
    (ResourceBusy, -16, "resource busy"),
    (FileExists, -17, "file exists"),
    (ImproperLink, -18, "improper link"),
    (NoSuchDevice, -19, "no such device"),
    (NotADirectory, -20, "not a directory"),
    (IsADirectory, -21, "is a directory"),
    (InvalidArgument, -22, "invalid argument"),
    (TooManyOpenFilesInSystem, -23, "too many open files in system"),
    (TooManyOpenFiles, -24, "too many open files"),
    (InappropriateIoControlOperation, -25, "inappropriate I/O control operation"),
    (FileTooLarge, -26, "file too large"),
    (NoSpaceLeftOnDevice, -27, "no space left on device"),
    (InvalidSeek, -28, "invalid seek"),
    (ReadOnlyFileSystem, -29, "read-only file system"),
    (TooManyLinks, -30, "too many links"),
    (BrokenPipe, -31, "broken pipe"),
    (DomainError, -32, "domain error"),
    (ResultTooLarge, -33, "result too large"),
    (ResourceDeadlockAvoided, -34, "resource deadlock avoided"),
    (NoMemoryAvailable, -35, "no memory available"),
    (FilenameTooLong, -36, "filename too long"),
    (NoLocksAvailable, -37, "no locks available"),
    (FunctionNotImplemented, -38, "function not implemented"),
    (DirectoryNotEmpty, -39, "directory not empty"),
    (IllegalByteSequence, -40, "illegal byte sequence"),
    (SocketNotInitialized, -41, "socket not initialized"),
    (OperationWouldBlock, -42, "operation would block"),
    (AddressIsNotAvailable, -43, "address is not available"),
    (NetworkIsDown, -44, "network is down"),
    (NoBuffer, -45, "no buffer"),
    (SocketIsAlreadyConnected, -46, "socket is already connected"),
    (SocketIsNotConnected, -47, "socket is not connected"),
    (SocketIsAlreadyShutdowned, -48, "socket is already shut down"),
    (OperationTimeout, -49, "operation timeout"),
    (ConnectionRefused, -50, "connection refused"),
    (RangeError, -51, "range error"),
    (TokenizerError, -52, "tokenizer error"),
    (FileCorrupt, -53, "file corrupt"),
    (InvalidFormat, -54, "invalid format"),
    (ObjectCorrupt, -55, "object corrupt"),
    (TooManySymbolicLinks, -56, "too many symbolic links"),
    (NotSocket, -57, "not a socket"),
    (OperationNotSupported, -58, "operation not supported"),
    (AddressIsInUse, -59, "address is in use"),
    (ZlibError, -60, "zlib error"),
    (Lz4Error, -61, "LZ4 error"),
    (StackOverFlow, -62, "stack overflow"),
    (SyntaxError, -63, "syntax error"),
    (RetryMax, -64, "retry limit exceeded"),
    (IncompatibleFileFormat, -65, "incompatible file format"),
    (UpdateNotAllowed, -66, "update not allowed"),
    (TooSmallOffset, -67, "too small offset"),
    (TooLargeOffset, -68, "too large offset"),
    (TooSmallLimit, -69, "too small limit"),
    (CasError, -70, "CAS error"),
    (UnsupportedCommandVersion, -71, "unsupported command version"),
    (NormalizerError, -72, "normalizer error"),
    (TokenFilterError, -73, "token filter error"),
    (CommandError, -74, "command error"),
    (PluginError, -75, "plugin error"),
    (ScorerError, -76, "scorer error"),
    (Cancel, -77, "canceled"),
    (WindowFunctionError, -78, "window function error"),
    (ZstdError, -79, "Zstandard error"),
}

impl ReturnCode {
    /// Whether this code signals a failure. End of data is not a failure.
    pub const fn is_error(self) -> bool {
        self.code() < 0
    }
}

impl Default for ReturnCode {
    fn default() -> Self {
        ReturnCode::Success
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn codes_are_unique() {
        let codes: HashSet<i32> =
            ReturnCode::ALL.iter().map(|rc| rc.code()).collect();
        assert_eq!(codes.len(), ReturnCode::ALL.len());
    }

    #[test]
    fn from_code_finds_every_entry() {
        for &rc in ReturnCode::ALL {
            assert_eq!(ReturnCode::from_code(rc.code()), rc);
        }
    }

    #[test]
    fn unknown_codes_fall_back() {
        assert_eq!(ReturnCode::from_code(-1000), ReturnCode::UnknownError);
        assert_eq!(ReturnCode::from_code(42), ReturnCode::UnknownError);
    }

    #[test]
    fn only_negative_codes_are_errors() {
        assert!(!ReturnCode::Success.is_error());
        assert!(!ReturnCode::EndOfData.is_error());
        assert!(ReturnCode::InvalidArgument.is_error());
        assert!(ReturnCode::ZstdError.is_error());
    }

    #[test]
    fn display_includes_name_and_code() {
        assert_eq!(
            ReturnCode::FileCorrupt.to_string(),
            "FileCorrupt (-53)"
        );
    }
}
