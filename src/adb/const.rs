/// The seven message commands adbd speaks, as 4-byte ASCII tags.
pub const SYNC: [u8; 4] = *b"SYNC";
pub const CNXN: [u8; 4] = *b"CNXN";
pub const AUTH: [u8; 4] = *b"AUTH";
pub const OPEN: [u8; 4] = *b"OPEN";
pub const OKAY: [u8; 4] = *b"OKAY";
pub const CLSE: [u8; 4] = *b"CLSE";
pub const WRTE: [u8; 4] = *b"WRTE";

pub const KNOWN_COMMANDS: [[u8; 4]; 7] = [SYNC, CNXN, AUTH, OPEN, OKAY, CLSE, WRTE];

pub fn is_known_command(command: [u8; 4]) -> bool {
    KNOWN_COMMANDS.contains(&command)
}

pub const ADB_VERSION: u32 = 0x0100_0000;
pub const ADB_MAX_PAYLOAD: u32 = 256 * 1024;

/// Feature banner this client advertises on CNXN, mirroring what a current
/// `adb` client host side sends.
pub const CLIENT_FEATURES: &str = "host::features=shell_v2,cmd,stat_v2,ls_v2,fixed_push_mkdir,apex,abb,\
fixed_push_symlink_timestamp,abb_exec,remount_shell,track_app,\
sendrecv_v2,sendrecv_v2_brotli,sendrecv_v2_lz4,sendrecv_v2_zstd,sendrecv_v2_dry_run_send";
