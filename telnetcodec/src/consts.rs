//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Telnet command and option byte table (RFC 854, RFC 855 and friends)

/// Null
pub const NUL: u8 = 0x00;
/// Line Feed
pub const LF: u8 = 0x0A;
/// Carriage Return
pub const CR: u8 = 0x0D;

/// End of Record
pub const EOR: u8 = 0xEF;
/// End of subnegotiation parameters
pub const SE: u8 = 0xF0;
/// No operation
pub const NOP: u8 = 0xF1;
/// Data Mark, the data stream portion of a Synch
pub const DM: u8 = 0xF2;
/// Break
pub const BRK: u8 = 0xF3;
/// Interrupt Process
pub const IP: u8 = 0xF4;
/// Abort Output
pub const AO: u8 = 0xF5;
/// Are You There
pub const AYT: u8 = 0xF6;
/// Erase Character
pub const EC: u8 = 0xF7;
/// Erase Line
pub const EL: u8 = 0xF8;
/// Go Ahead
pub const GA: u8 = 0xF9;
/// Subnegotiation Begin
pub const SB: u8 = 0xFA;
/// Sender wants to begin performing an option
pub const WILL: u8 = 0xFB;
/// Sender refuses to perform an option
pub const WONT: u8 = 0xFC;
/// Sender requests the receiver perform an option
pub const DO: u8 = 0xFD;
/// Sender requests the receiver stop performing an option
pub const DONT: u8 = 0xFE;
/// Interpret As Command
pub const IAC: u8 = 0xFF;

/// Telnet option codes
pub mod option {
    /// Binary Transmission (RFC 856)
    pub const BINARY: u8 = 0;
    /// Echo (RFC 857)
    pub const ECHO: u8 = 1;
    /// Suppress Go Ahead (RFC 858)
    pub const SGA: u8 = 3;
    /// Status (RFC 859)
    pub const STATUS: u8 = 5;
    /// Timing Mark (RFC 860)
    pub const TM: u8 = 6;
    /// Terminal Type (RFC 1091)
    pub const TTYPE: u8 = 24;
    /// End of Record (RFC 885)
    pub const EOR: u8 = 25;
    /// Negotiate About Window Size (RFC 1073)
    pub const NAWS: u8 = 31;
    /// Terminal Speed (RFC 1079)
    pub const TSPEED: u8 = 32;
    /// Remote Flow Control (RFC 1372)
    pub const LFLOW: u8 = 33;
    /// Linemode (RFC 1184)
    pub const LINEMODE: u8 = 34;
    /// New Environment (RFC 1572)
    pub const NEW_ENVIRONMENT: u8 = 39;
    /// Charset (RFC 2066)
    pub const CHARSET: u8 = 42;
    /// MUD Server Data Protocol
    pub const MSDP: u8 = 69;
    /// MUD Server Status Protocol
    pub const MSSP: u8 = 70;
    /// MUD Client Compression Protocol v2
    pub const COMPRESS2: u8 = 86;
    /// Generic MUD Communication Protocol
    pub const GMCP: u8 = 201;
}

/// Returns the mnemonic for a telnet command byte, if it is one.
pub fn command_name(byte: u8) -> Option<&'static str> {
    let name = match byte {
        EOR => "EOR",
        SE => "SE",
        NOP => "NOP",
        DM => "DM",
        BRK => "BRK",
        IP => "IP",
        AO => "AO",
        AYT => "AYT",
        EC => "EC",
        EL => "EL",
        GA => "GA",
        SB => "SB",
        WILL => "WILL",
        WONT => "WONT",
        DO => "DO",
        DONT => "DONT",
        IAC => "IAC",
        _ => return None,
    };
    Some(name)
}

/// Returns the mnemonic for a telnet option code, if this table knows it.
pub fn option_name(byte: u8) -> Option<&'static str> {
    let name = match byte {
        option::BINARY => "BINARY",
        option::ECHO => "ECHO",
        option::SGA => "SGA",
        option::STATUS => "STATUS",
        option::TM => "TM",
        option::TTYPE => "TTYPE",
        option::EOR => "EOR",
        option::NAWS => "NAWS",
        option::TSPEED => "TSPEED",
        option::LFLOW => "LFLOW",
        option::LINEMODE => "LINEMODE",
        option::NEW_ENVIRONMENT => "NEW-ENVIRON",
        option::CHARSET => "CHARSET",
        option::MSDP => "MSDP",
        option::MSSP => "MSSP",
        option::COMPRESS2 => "MCCP2",
        option::GMCP => "GMCP",
        _ => return None,
    };
    Some(name)
}

/// Returns `true` for the negotiation verbs that carry a one byte option.
pub fn is_negotiation(byte: u8) -> bool {
    matches!(byte, WILL | WONT | DO | DONT)
}
