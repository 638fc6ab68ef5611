use std::{collections::VecDeque, fmt::Display};

use log::{debug, info};

use crate::int_code::{Machine, WalkState, WalkToken};

pub const NAT_ADDR: usize = 255;
pub const NAT_SEND_ADDR: usize = 0;

#[derive(Debug)]
pub enum Error {
    ExecutionError(usize, crate::Error),
    SendDataBeforeWorking(usize, i64),
    InvalidSendAddr(i64),
    IncompletePacket(usize),
    IdleWithoutNATPacket,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ExecutionError(addr, ee) => write!(
                f,
                "Get error({}) in execution of host with address({})",
                ee, addr
            ),
            Error::SendDataBeforeWorking(addr, v) => write!(
                f,
                "Host({}) try to send data({}) before network interface card is working",
                addr, v
            ),
            Error::InvalidSendAddr(addr) => {
                write!(f, "Try to send packet to invalid address({})", addr)
            }
            Error::IncompletePacket(addr) => write!(
                f,
                "Host({}) stops sending in the middle of a packet",
                addr
            ),
            Error::IdleWithoutNATPacket => {
                write!(f, "Network is idle, but NAT hasn't received any packet")
            }
        }
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    from_addr: usize,
    to_addr: usize,
    x: i64,
    y: i64,
}

impl Display for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(from: {}, to: {}, x: {}, y: {})",
            self.from(),
            self.to(),
            self.x(),
            self.y()
        )
    }
}

impl Packet {
    pub fn from(&self) -> usize {
        self.from_addr
    }

    pub fn to(&self) -> usize {
        self.to_addr
    }

    pub fn x(&self) -> i64 {
        self.x
    }

    pub fn y(&self) -> i64 {
        self.y
    }
}

// Only the latest packet is kept, and sent again whenever the network goes idle.
#[derive(Debug)]
pub struct NetworkNAT {
    addr: usize,
    send_addr: usize,
    first_recv_y: Option<i64>,
    last_pac: Option<Packet>,
    last_sent_y: Option<i64>,
}

impl NetworkNAT {
    pub fn new(addr: usize, send_addr: usize) -> Self {
        Self {
            addr,
            send_addr,
            first_recv_y: None,
            last_pac: None,
            last_sent_y: None,
        }
    }

    pub fn addr(&self) -> usize {
        self.addr
    }

    pub fn first_recv_y(&self) -> Option<i64> {
        self.first_recv_y
    }

    pub fn last_sent_y(&self) -> Option<i64> {
        self.last_sent_y
    }

    pub fn recv(&mut self, pac: Packet) {
        debug!("NAT receive {}", pac);
        self.first_recv_y.get_or_insert(pac.y());
        self.last_pac = Some(pac);
    }

    // Returns the packet to send and whether its y repeats the one sent last time.
    pub fn send(&mut self) -> Option<(Packet, bool)> {
        let mut pac = self.last_pac.clone()?;
        pac.from_addr = self.addr;
        pac.to_addr = self.send_addr;
        info!("NAT send {}.", pac);
        let is_repeated = self.last_sent_y.replace(pac.y()) == Some(pac.y());
        Some((pac, is_repeated))
    }
}

#[derive(Debug)]
pub struct NetworkHub {
    ports: Vec<VecDeque<Packet>>,
    nat: NetworkNAT,
}

impl NetworkHub {
    pub fn new(host_n: usize) -> Self {
        Self {
            ports: vec![VecDeque::new(); host_n],
            nat: NetworkNAT::new(NAT_ADDR, NAT_SEND_ADDR),
        }
    }

    pub fn nat(&self) -> &NetworkNAT {
        &self.nat
    }

    pub fn send(&mut self, packet: Packet) -> Result<(), Error> {
        debug!("Send: {}", packet);
        if packet.to() == self.nat.addr() {
            self.nat.recv(packet);
            return Ok(());
        }

        let to_addr = packet.to();
        self.ports
            .get_mut(to_addr)
            .ok_or(Error::InvalidSendAddr(to_addr as i64))?
            .push_back(packet);
        Ok(())
    }

    pub fn recv(&mut self, addr: usize) -> Option<Packet> {
        self.ports
            .get_mut(addr)
            .and_then(|q| q.pop_front())
            .inspect(|p| debug!("Receive: {}", p))
    }

    // True once NAT would send the same y twice in a row, that packet isn't delivered.
    fn wake_up(&mut self) -> Result<bool, Error> {
        let (pac, is_repeated) = self.nat.send().ok_or(Error::IdleWithoutNATPacket)?;
        if is_repeated {
            Ok(true)
        } else {
            self.send(pac)?;
            Ok(false)
        }
    }
}

enum PacketAsmState {
    Idle,
    WaitX,
    WaitY,
}

struct PacketAssembler {
    state: PacketAsmState,
    imm_packet: Packet,
}

impl PacketAssembler {
    pub fn new(addr: usize) -> Self {
        Self {
            state: PacketAsmState::Idle,
            imm_packet: Packet {
                from_addr: addr,
                to_addr: 0,
                x: 0,
                y: 0,
            },
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, PacketAsmState::Idle)
    }

    pub fn assemble(&mut self, value: i64) -> Result<Option<Packet>, Error> {
        match self.state {
            PacketAsmState::Idle => {
                let to_addr = usize::try_from(value).map_err(|_| Error::InvalidSendAddr(value))?;
                self.imm_packet.to_addr = to_addr;
                self.state = PacketAsmState::WaitX;
                Ok(None)
            }
            PacketAsmState::WaitX => {
                self.imm_packet.x = value;
                self.state = PacketAsmState::WaitY;
                Ok(None)
            }
            PacketAsmState::WaitY => {
                self.imm_packet.y = value;
                self.state = PacketAsmState::Idle;
                Ok(Some(self.imm_packet.clone()))
            }
        }
    }
}

pub struct NICard {
    addr: usize,
    machine: Machine,
    token: WalkToken,
    pac_asm: PacketAssembler,
}

impl NICard {
    pub fn boot(addr: usize, int_code: &[i64], hub: &mut NetworkHub) -> Result<Self, Error> {
        let mut card = Self {
            addr,
            machine: Machine::load(int_code),
            token: WalkToken::new(),
            pac_asm: PacketAssembler::new(addr),
        };

        match card
            .machine
            .resume(&mut card.token)
            .map_err(|e| Error::ExecutionError(addr, e))?
        {
            WalkState::HasOutput => {
                return Err(Error::SendDataBeforeWorking(addr, card.token.read_output()))
            }
            WalkState::NeedInput => {
                card.feed(addr as i64, hub)?;
            }
            _ => (),
        }

        Ok(card)
    }

    pub fn addr(&self) -> usize {
        self.addr
    }

    pub fn is_halted(&self) -> bool {
        self.token.is_halted()
    }

    // Deliver the next packet, or -1 if there is none. Returns whether any packet moved.
    pub fn step(&mut self, hub: &mut NetworkHub) -> Result<bool, Error> {
        if !self.token.is_input() {
            return Ok(false);
        }

        match hub.recv(self.addr) {
            Some(pac) => {
                self.feed(pac.x(), hub)?;
                // Host may have halted after taking x, then y is dropped.
                self.feed(pac.y(), hub)?;
                Ok(true)
            }
            None => self.feed(-1, hub),
        }
    }

    fn feed(&mut self, value: i64, hub: &mut NetworkHub) -> Result<bool, Error> {
        if !self.token.is_input() {
            return Ok(false);
        }

        self.token.provide_input(value);
        self.pump(hub)
    }

    fn pump(&mut self, hub: &mut NetworkHub) -> Result<bool, Error> {
        let mut sent = false;
        loop {
            let state = self
                .machine
                .resume(&mut self.token)
                .map_err(|e| Error::ExecutionError(self.addr, e))?;
            match state {
                WalkState::HasOutput => {
                    if let Some(pac) = self.pac_asm.assemble(self.token.read_output())? {
                        hub.send(pac)?;
                        sent = true;
                    }
                }
                _ => {
                    if !self.pac_asm.is_idle() {
                        return Err(Error::IncompletePacket(self.addr));
                    }
                    return Ok(sent);
                }
            }
        }
    }
}

pub fn run_network(int_code: &[i64], host_n: usize) -> Result<NetworkHub, Error> {
    let mut hub = NetworkHub::new(host_n);
    let mut cards = (0..host_n)
        .map(|addr| NICard::boot(addr, int_code, &mut hub))
        .collect::<Result<Vec<_>, Error>>()?;

    loop {
        let mut idle = true;
        for card in cards.iter_mut() {
            if card.step(&mut hub)? {
                idle = false;
            }
        }

        if idle && hub.wake_up()? {
            return Ok(hub);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Read address a, send (255, a, a + 100), then keep reading forever.
    const HOST: [i64; 17] = [3, 50, 104, 255, 4, 50, 1001, 50, 100, 51, 4, 51, 3, 52, 1105, 1, 12];

    fn packet(to_addr: usize, x: i64, y: i64) -> Packet {
        Packet {
            from_addr: 9,
            to_addr,
            x,
            y,
        }
    }

    #[test]
    fn nat_restarts_idle_network() {
        let mut hub = run_network(&HOST, 3).unwrap();
        assert_eq!(hub.nat().first_recv_y(), Some(100));
        assert_eq!(hub.nat().last_sent_y(), Some(102));
        // The repeated packet is not delivered, and the first one has been read by host 0.
        assert!(hub.recv(0).is_none());
    }

    #[test]
    fn nat_keeps_latest_packet_only() {
        let mut nat = NetworkNAT::new(NAT_ADDR, NAT_SEND_ADDR);
        assert!(nat.send().is_none());

        nat.recv(packet(NAT_ADDR, 1, 10));
        nat.recv(packet(NAT_ADDR, 2, 20));
        assert_eq!(nat.first_recv_y(), Some(10));
        let (pac, is_repeated) = nat.send().unwrap();
        assert_eq!((pac.from(), pac.to(), pac.x(), pac.y()), (NAT_ADDR, 0, 2, 20));
        assert!(!is_repeated);
        assert_eq!(nat.send().map(|(_, r)| r), Some(true));

        nat.recv(packet(NAT_ADDR, 3, 30));
        assert_eq!(nat.send().map(|(_, r)| r), Some(false));
        assert_eq!(nat.last_sent_y(), Some(30));
        assert_eq!(nat.first_recv_y(), Some(10));
    }

    #[test]
    fn hub_queues_drain_in_order() {
        let mut hub = NetworkHub::new(2);
        hub.send(packet(1, 1, 2)).unwrap();
        hub.send(packet(1, 3, 4)).unwrap();
        assert_eq!(hub.recv(1).map(|p| p.x()), Some(1));
        assert_eq!(hub.recv(1).map(|p| p.x()), Some(3));
        assert!(hub.recv(1).is_none());
        assert!(hub.recv(0).is_none());
        assert!(matches!(
            hub.send(packet(2, 0, 0)),
            Err(Error::InvalidSendAddr(2))
        ));
    }

    #[test]
    fn packet_assembled_from_three_outputs() {
        let mut asm = PacketAssembler::new(4);
        assert!(asm.assemble(2).unwrap().is_none());
        assert!(asm.assemble(-8).unwrap().is_none());
        assert!(!asm.is_idle());
        let pac = asm.assemble(9).unwrap().unwrap();
        assert_eq!((pac.from(), pac.to(), pac.x(), pac.y()), (4, 2, -8, 9));
        assert!(asm.is_idle());
        assert!(matches!(asm.assemble(-1), Err(Error::InvalidSendAddr(-1))));
    }

    #[test]
    fn halted_host_drops_out() {
        // Host 0 sends (255, 7, 8) and keeps reading, every other host halts after its address.
        let program = [
            3, 50, 1005, 50, 16, 104, 255, 104, 7, 104, 8, 3, 52, 1105, 1, 11, 99,
        ];
        let mut hub = NetworkHub::new(2);
        let mut halted = NICard::boot(1, &program, &mut hub).unwrap();
        assert!(halted.is_halted());
        assert_eq!(halted.addr(), 1);
        assert!(!halted.step(&mut hub).unwrap());

        let hub = run_network(&program, 2).unwrap();
        assert_eq!(hub.nat().first_recv_y(), Some(8));
        assert_eq!(hub.nat().last_sent_y(), Some(8));
    }

    #[test]
    fn host_halting_after_x_drops_y() {
        // Host 0 sends (1, 5, 6) then (255, 1, 2). Host 1 skips -1, halts on the first real value.
        let program = [
            3, 50, 1005, 50, 22, 104, 1, 104, 5, 104, 6, 104, 255, 104, 1, 104, 2, 3, 52, 1105, 1,
            17, 3, 52, 1008, 52, -1, 53, 1005, 53, 22, 99,
        ];
        let mut hub = NetworkHub::new(2);
        let _host0 = NICard::boot(0, &program, &mut hub).unwrap();
        let mut host1 = NICard::boot(1, &program, &mut hub).unwrap();
        assert!(!host1.is_halted());
        assert!(host1.step(&mut hub).unwrap());
        assert!(host1.is_halted());
        assert!(hub.recv(1).is_none());

        let hub = run_network(&program, 2).unwrap();
        assert_eq!(hub.nat().last_sent_y(), Some(2));
    }

    #[test]
    fn send_to_unknown_host_fails() {
        let program = [3, 50, 104, 7, 104, 0, 104, 0, 3, 52, 1105, 1, 8];
        assert!(matches!(
            run_network(&program, 2),
            Err(Error::InvalidSendAddr(7))
        ));
    }

    #[test]
    fn half_sent_packet_fails() {
        let program = [3, 50, 104, 1, 3, 52, 99];
        assert!(matches!(
            run_network(&program, 2),
            Err(Error::IncompletePacket(0))
        ));
    }

    #[test]
    fn silent_network_without_nat_packet_fails() {
        let program = [3, 50, 3, 52, 1105, 1, 2];
        assert!(matches!(
            run_network(&program, 2),
            Err(Error::IdleWithoutNATPacket)
        ));
    }

    #[test]
    fn output_before_address_fails() {
        assert!(matches!(
            run_network(&[104, 1, 99], 1),
            Err(Error::SendDataBeforeWorking(0, 1))
        ));
    }
}
