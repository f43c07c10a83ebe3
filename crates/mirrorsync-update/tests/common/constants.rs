//! Shared constants for test infrastructure

// Content versions
pub const VERSION_0_9: &str = "0.9";
pub const VERSION_1_0: &str = "1.0";
pub const VERSION_2_0: &str = "2.0";

// Client versions
pub const CLIENT_0_2_0: &str = "0.2.0";
pub const CLIENT_0_3_0: &str = "0.3.0";

// Routes
pub const MANIFEST_ROUTE: &str = "/mod/master.json";
pub const SLOW_MANIFEST_ROUTE: &str = "/slow/master.json";
pub const FAST_MANIFEST_ROUTE: &str = "/fast/master.json";
pub const OLD_MANIFEST_ROUTE: &str = "/old/master.json";
pub const VERSION_ROUTE: &str = "/client/version.json";
pub const CLIENT_BINARY_ROUTE: &str = "/client/mirrorsync-new";

// File contents
pub const CONTENT_A: &[u8] = b"alpha file content\n";
pub const CONTENT_B: &[u8] = b"bravo file content\n";
pub const CONTENT_C: &[u8] = b"charlie file content\n";
pub const STALE_CONTENT: &[u8] = b"an older revision\n";
pub const CORRUPT_CONTENT: &[u8] = b"bytes that hash to something else\n";
pub const NEW_CLIENT_BINARY: &[u8] = b"#!/bin/sh\necho new client\n";

pub const WRONG_SHA1: &str = "0000000000000000000000000000000000000000";

// Executable names
pub const EXE_NAME: &str = "mirrorsync";
pub const STAGED_EXE_NAME: &str = "_mirrorsync";
